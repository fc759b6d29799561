// [libs/domain/models/src/tests_serialization.rs]
/**
 * =================================================================
 * APARATO: DOMAIN SERIALIZATION TEST (V7.1 - INTEGRATION LEVEL)
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L2-MODELS)
 * RESPONSABILIDAD: CERTIFICACIÓN DE PARIDAD JSON DEL PLANO DE CONTROL
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. TAGGED UNION INTEGRITY: Valida que la unión discriminada de
 *    comandos de cortafuegos preserve 'action' + 'params' bit-perfecto
 *    y rechace variantes desconocidas en la frontera.
 * 2. FLATTEN PARITY: Certifica que CommandDirective aplana la acción
 *    junto al 'id' tal como la consume el centinela.
 * 3. HYGIENE: Erradicación total de 'crate::' por nombres nominales.
 * =================================================================
 */
