// [libs/infra/db/src/schema.rs]
/**
 * =================================================================
 * APARATO: GUARDIAN DATABASE SCHEMA (V12.0 - CONTROL PLANE STRATA)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: GOBERNANZA ESTRUCTURAL E IDEMPOTENCIA TOTAL
 *
 * VISION HIPER-HOLÍSTICA:
 * 1. DEDUP CONSTRAINTS: Llaves únicas sobre event_uuid, batch_uuid,
 *    command_uuid y agent_id respaldan la semántica de idempotencia.
 * 2. SINGLE ACTIVE BLOCK: Índice único parcial sobre (ip, agente)
 *    restringido a filas activas.
 * 3. IDEMPOTENCIA: Gestión de errores para migraciones en caliente.
 * 4. PERFORMANCE: Índices de aceleración para ventanas conductuales.
 * =================================================================
 */

use anyhow::{Context, Result};
use libsql::Connection;
use tracing::{debug, info, instrument, warn};

/**
 * ESTRATO 1: SOLIDIFICACIÓN (Génesis de Tablas)
 * Define las entidades base del plano de control Guardian.
 */
const TACTICAL_TABLES: &[(&str, &str)] = &[
    ("TABLE_AGENTS", r#"
        CREATE TABLE IF NOT EXISTS agents (
            id TEXT PRIMARY KEY,
            agent_id TEXT NOT NULL UNIQUE,
            api_key TEXT NOT NULL,
            hostname TEXT NOT NULL,
            display_name TEXT,
            environment_tag TEXT,
            version TEXT,
            system_info TEXT DEFAULT '{}',
            supported_features TEXT DEFAULT '{}',
            is_approved INTEGER DEFAULT 0,
            is_active INTEGER DEFAULT 1,
            status TEXT DEFAULT 'pending',
            health TEXT DEFAULT 'unknown',
            heartbeat_interval_sec INTEGER DEFAULT 60,
            last_heartbeat_at DATETIME,
            registered_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_AUTH_EVENTS", r#"
        CREATE TABLE IF NOT EXISTS auth_events (
            event_uuid TEXT PRIMARY KEY,
            timestamp DATETIME NOT NULL,
            source_type TEXT NOT NULL,
            agent_id TEXT,
            simulation_run_id TEXT,
            event_type TEXT NOT NULL,
            auth_method TEXT NOT NULL,
            source_ip TEXT NOT NULL,
            source_ip_packed BLOB,
            target_username TEXT NOT NULL,
            target_port INTEGER,
            failure_reason TEXT,
            geo_ip TEXT,
            block_id TEXT,
            batch_uuid TEXT,
            raw_line TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_IP_GEO", r#"
        CREATE TABLE IF NOT EXISTS ip_geo (
            ip TEXT PRIMARY KEY,
            country_code TEXT,
            country_name TEXT,
            city TEXT,
            asn INTEGER,
            isp TEXT,
            latitude REAL,
            longitude REAL,
            utc_offset_seconds INTEGER,
            is_proxy INTEGER DEFAULT 0,
            is_vpn INTEGER DEFAULT 0,
            is_tor INTEGER DEFAULT 0,
            is_datacenter INTEGER DEFAULT 0,
            abuse_confidence_score INTEGER,
            abuse_report_count INTEGER,
            vt_positives INTEGER,
            vt_total INTEGER,
            threat_level TEXT DEFAULT 'unknown',
            geo_expires_at DATETIME,
            abuse_expires_at DATETIME,
            vt_expires_at DATETIME,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_BLOCKING_RULES", r#"
        CREATE TABLE IF NOT EXISTS blocking_rules (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            rule_type TEXT NOT NULL,
            priority INTEGER DEFAULT 100,
            enabled INTEGER DEFAULT 1,
            conditions TEXT NOT NULL,
            severity INTEGER NOT NULL,
            block_duration_minutes INTEGER,
            auto_unblock INTEGER DEFAULT 1,
            notification_channels TEXT DEFAULT '[]',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_IP_BLOCKS", r#"
        CREATE TABLE IF NOT EXISTS ip_blocks (
            id TEXT PRIMARY KEY,
            ip_address TEXT NOT NULL,
            cidr_range TEXT,
            reason TEXT NOT NULL,
            source TEXT NOT NULL,
            rule_id TEXT,
            event_uuid TEXT,
            agent_id TEXT,
            block_type TEXT,
            is_active INTEGER DEFAULT 1,
            blocked_at DATETIME NOT NULL,
            unblock_at DATETIME,
            auto_unblock INTEGER DEFAULT 1,
            unblocked_at DATETIME,
            unblock_reason TEXT
        );
    "#),
    ("TABLE_BLOCKING_ACTIONS", r#"
        CREATE TABLE IF NOT EXISTS blocking_actions (
            action_uuid TEXT PRIMARY KEY,
            block_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            performed_by TEXT NOT NULL,
            reason TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_AGENT_UFW_STATE", r#"
        CREATE TABLE IF NOT EXISTS agent_ufw_state (
            agent_id TEXT PRIMARY KEY,
            status TEXT NOT NULL,
            default_incoming TEXT,
            default_outgoing TEXT,
            default_routed TEXT,
            logging_level TEXT,
            ipv6_enabled INTEGER DEFAULT 0,
            version TEXT,
            rules_count INTEGER DEFAULT 0,
            collected_at DATETIME,
            synced_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_AGENT_UFW_RULES", r#"
        CREATE TABLE IF NOT EXISTS agent_ufw_rules (
            agent_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            raw_text TEXT NOT NULL,
            action TEXT,
            direction TEXT,
            from_source TEXT,
            to_destination TEXT,
            PRIMARY KEY (agent_id, position)
        );
    "#),
    ("TABLE_AGENT_UFW_COMMANDS", r#"
        CREATE TABLE IF NOT EXISTS agent_ufw_commands (
            command_uuid TEXT PRIMARY KEY,
            agent_id TEXT NOT NULL,
            action_json TEXT NOT NULL,
            raw_command TEXT NOT NULL,
            target_ip TEXT,
            status TEXT DEFAULT 'pending',
            result_message TEXT,
            created_by TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            sent_at DATETIME,
            executed_at DATETIME
        );
    "#),
    ("TABLE_AGENT_HEARTBEATS", r#"
        CREATE TABLE IF NOT EXISTS agent_heartbeats (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            agent_id TEXT NOT NULL,
            cpu_percent REAL,
            memory_percent REAL,
            disk_percent REAL,
            uptime_seconds INTEGER,
            health TEXT,
            received_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_AGENT_LOG_BATCHES", r#"
        CREATE TABLE IF NOT EXISTS agent_log_batches (
            batch_uuid TEXT PRIMARY KEY,
            agent_id TEXT NOT NULL,
            hostname TEXT,
            source_filename TEXT,
            declared_count INTEGER DEFAULT 0,
            events_created INTEGER DEFAULT 0,
            events_failed INTEGER DEFAULT 0,
            status TEXT DEFAULT 'received',
            failure_reason TEXT,
            received_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            completed_at DATETIME
        );
    "#),
    ("TABLE_AUTH_EVENTS_ML", r#"
        CREATE TABLE IF NOT EXISTS auth_events_ml (
            event_uuid TEXT PRIMARY KEY,
            model_identifier TEXT NOT NULL,
            risk_score REAL NOT NULL,
            threat_type TEXT,
            confidence REAL DEFAULT 0.0,
            is_anomaly INTEGER DEFAULT 0,
            features_snapshot TEXT DEFAULT '{}',
            inference_latency_ms REAL DEFAULT 0.0,
            operator_feedback TEXT,
            resulted_in_block INTEGER DEFAULT 0
        );
    "#),
    ("TABLE_FAIL2BAN_EVENTS", r#"
        CREATE TABLE IF NOT EXISTS fail2ban_events (
            id TEXT PRIMARY KEY,
            agent_id TEXT,
            ip_address TEXT NOT NULL,
            jail TEXT NOT NULL,
            is_ban INTEGER NOT NULL,
            raw_line TEXT NOT NULL,
            observed_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_SYSTEM_SETTINGS", r#"
        CREATE TABLE IF NOT EXISTS system_settings (
            key TEXT PRIMARY KEY,
            value_text TEXT,
            value_real REAL,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
];

/**
 * ESTRATO 2: EVOLUCIÓN (Mutaciones de Columna)
 * Asegura que las tablas existentes se adapten a las nuevas capacidades.
 */
const EVOLUTIONARY_STRATA: &[(&str, &str)] = &[
    ("AGENT_ENVIRONMENT", "ALTER TABLE agents ADD COLUMN environment_tag TEXT"),
    ("AGENT_DISPLAY_NAME", "ALTER TABLE agents ADD COLUMN display_name TEXT"),
    ("EVENT_SIMULATION", "ALTER TABLE auth_events ADD COLUMN simulation_run_id TEXT"),
    ("EVENT_BATCH_LINK", "ALTER TABLE auth_events ADD COLUMN batch_uuid TEXT"),
    ("GEO_TIMEZONE", "ALTER TABLE ip_geo ADD COLUMN utc_offset_seconds INTEGER"),
    ("COMMAND_TARGET_IP", "ALTER TABLE agent_ufw_commands ADD COLUMN target_ip TEXT"),
    ("BLOCK_TYPE", "ALTER TABLE ip_blocks ADD COLUMN block_type TEXT"),
];

/**
 * ESTRATO 3: ENDURECIMIENTO (Índices de Aceleración e Invariantes)
 * El índice parcial de bloqueos sella el invariante de fila activa única.
 */
const ACCELERATION_INDEXES: &[(&str, &str)] = &[
    ("IDX_BLOCKS_SINGLE_ACTIVE", r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_blocks_single_active
        ON ip_blocks(ip_address, agent_id) WHERE is_active = 1;
    "#),
    ("IDX_EVENTS_IP_TIME", "CREATE INDEX IF NOT EXISTS idx_events_ip_time ON auth_events(source_ip, timestamp);"),
    ("IDX_EVENTS_USERNAME", "CREATE INDEX IF NOT EXISTS idx_events_username ON auth_events(target_username, timestamp);"),
    ("IDX_COMMANDS_DISPATCH", "CREATE INDEX IF NOT EXISTS idx_commands_dispatch ON agent_ufw_commands(agent_id, status, created_at);"),
    ("IDX_HEARTBEATS_AGENT", "CREATE INDEX IF NOT EXISTS idx_heartbeats_agent ON agent_heartbeats(agent_id, received_at);"),
    ("IDX_BLOCKS_SWEEP", "CREATE INDEX IF NOT EXISTS idx_blocks_sweep ON ip_blocks(is_active, unblock_at);"),
    ("IDX_BATCHES_AGENT", "CREATE INDEX IF NOT EXISTS idx_batches_agent ON agent_log_batches(agent_id, status);"),
];

/**
 * Ejecuta la secuencia maestra de sincronización del esquema estructural.
 *
 * # Errors:
 * Retorna error si alguna tabla base falla en solidificarse, indicando
 * un colapso en el enlace con el motor libSQL.
 */
#[instrument(skip(database_connection))]
pub async fn apply_full_guardian_schema(database_connection: &Connection) -> Result<()> {
    info!("🏗️ [SCHEMA_ENGINE]: Initiating structural synchronization V12.0...");

    solidify_base_strata(database_connection).await?;
    execute_evolutionary_repair(database_connection).await?;
    harden_access_layer(database_connection).await?;

    info!("✅ [SCHEMA_ENGINE]: Guardian Ledger V12.0 level and certified.");
    Ok(())
}

async fn solidify_base_strata(db: &Connection) -> Result<()> {
    for (identifier, sql) in TACTICAL_TABLES {
        debug!("  ↳ Solidifying: {}", identifier);
        db.execute(*sql, ()).await
            .with_context(|| format!("CRITICAL_SOLIDIFICATION_FAULT: {}", identifier))?;
    }
    Ok(())
}

async fn execute_evolutionary_repair(db: &Connection) -> Result<()> {
    for (identifier, sql) in EVOLUTIONARY_STRATA {
        match db.execute(*sql, ()).await {
            Ok(_) => info!("  🟢 [REPAIR_OK]: Applied evolutionary stratum {}", identifier),
            Err(e) => {
                let message = e.to_string();
                if message.contains("duplicate column name") {
                    debug!("  ⚪ [REPAIR_SKIP]: {} already level.", identifier);
                } else {
                    warn!("  ⚠️ [REPAIR_BYPASS]: {} check incomplete: {}", identifier, message);
                }
            }
        }
    }
    Ok(())
}

async fn harden_access_layer(db: &Connection) -> Result<()> {
    for (identifier, sql) in ACCELERATION_INDEXES {
        debug!("  ↳ Hardening: {}", identifier);
        db.execute(*sql, ()).await
            .with_context(|| format!("CRITICAL_HARDENING_FAULT: {}", identifier))?;
    }
    Ok(())
}
