// [tests/mirror/libs/shared/watchtower/watchtower_integrity.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE INTEGRIDAD WATCHTOWER (V2.0 - ZENITH)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L4-MIRROR
 * RESPONSABILIDAD: IGNICIÓN ÚNICA DEL TRAZADO Y ESCUDO DE PÁNICOS
 * =================================================================
 */

use guardian_shared_watchtower::init_tracing;

#[cfg(test)]
mod tests {
    use super::*;

    /**
     * CERTIFICACIÓN: La ignición del trazado es estable y los niveles
     * estándar emiten sin pánico tras el hook Phoenix.
     */
    #[test]
    fn certify_tracing_ignition_and_emission() {
        println!("\n👁️ [INICIO]: Auditoría de Integridad Watchtower V2.0...");

        init_tracing("guardian_watchtower_certification");

        tracing::info!("🧪 [PROBE]: info stratum emission");
        tracing::warn!("🧪 [PROBE]: warn stratum emission");
        tracing::debug!("🧪 [PROBE]: debug stratum emission");

        // El hook de pánico quedó instalado sin perturbar el flujo nominal.
        let hooked = std::panic::take_hook();
        std::panic::set_hook(hooked);

        println!("🏁 [INFORME]: Watchtower certificado GOLD_MASTER.");
    }
}
