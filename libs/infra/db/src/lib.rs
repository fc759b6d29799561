// [libs/infra/db/src/lib.rs]
/*!
 * =================================================================
 * APARATO: DATABASE LIBRARY BARREL (V4.0 - LEDGER AUTHORITY)
 * CLASIFICACIÓN: INFRASTRUCTURE LIB (ESTRATO L3)
 * RESPONSABILIDAD: EXPOSICIÓN PÚBLICA DEL SUSTRATO DE PERSISTENCIA
 *
 * VISION HIPER-HOLÍSTICA:
 * Centraliza cliente, esquema, catálogo de errores y la matriz de
 * repositorios. Todo SQL del tejido vive bajo 'repositories/'.
 * =================================================================
 */

pub mod client;
pub mod errors;
pub mod repositories;
pub mod schema;

pub use client::DbClient;
pub use errors::DbError;
