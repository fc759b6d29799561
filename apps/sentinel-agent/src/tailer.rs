// [apps/sentinel-agent/src/tailer.rs]
/*!
 * =================================================================
 * APARATO: AUTH LOG TAILER (V12.0 - ROTATION AWARE)
 * CLASIFICACIÓN: WORKER EXECUTION LAYER (ESTRATO L1-WORKER)
 * RESPONSABILIDAD: LECTURA INCREMENTAL CON SEMÁNTICA AT-LEAST-ONCE
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. ROTATION DETECTION: Antes de cada lectura se compara la identidad
 *    del archivo (inode); identidad nueva => offset 0.
 * 2. TRUNCATION GUARD: Offset mayor que el tamaño actual => offset 0
 *    (cubre también la rotación copy-truncate).
 * 3. POSITION TOKENS: Cada emisión porta (identidad, offset al final
 *    de la línea) para el avance confirmado por rebanada.
 * 4. BOUNDED MEMORY: Lectura secuencial con BufReader; el filtro de
 *    relevancia SSH descarta sin acumular.
 * =================================================================
 */

use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Marcadores de relevancia SSH (coincidencia por substring).
const SSH_RELEVANCE_MARKERS: &[&str] = &[
    "sshd",
    "ssh",
    "Failed password",
    "Accepted password",
    "Accepted publickey",
    "Invalid user",
    "Connection closed",
];

/// Línea emitida con su token de posición (offset al final de línea).
#[derive(Debug, Clone)]
pub struct TailedLine {
    pub content: String,
    pub end_offset: u64,
}

/// Resultado de una pasada de lectura del vigía.
#[derive(Debug, Default)]
pub struct TailReadOutcome {
    pub lines: Vec<TailedLine>,
    /// Identidad del archivo leído (inode).
    pub file_identity: u64,
    /// Offset final de la pasada completa (incluye líneas filtradas).
    pub final_offset: u64,
    pub rotation_detected: bool,
}

pub struct LogTailer {
    log_path: PathBuf,
}

impl LogTailer {
    pub fn new(log_path: PathBuf) -> Self {
        Self { log_path }
    }

    pub fn path(&self) -> &Path {
        &self.log_path
    }

    /**
     * Lee las líneas nuevas desde el token de posición dado.
     *
     * Archivo ausente: se registra y retorna pasada vacía (no fatal).
     */
    pub fn collect_new_lines(&self, last_identity: u64, last_position: u64) -> TailReadOutcome {
        let metadata = match std::fs::metadata(&self.log_path) {
            Ok(metadata) => metadata,
            Err(stat_fault) => {
                warn!(
                    "👁️ [TAILER_IDLE]: Log file [{}] unavailable this tick: {}",
                    self.log_path.display(),
                    stat_fault
                );
                return TailReadOutcome::default();
            }
        };

        let current_identity = file_identity(&metadata);
        let current_size = metadata.len();

        // 1. DETECCIÓN DE ROTACIÓN (identidad nueva => offset 0)
        let mut read_offset = last_position;
        let mut rotation_detected = false;
        if current_identity != last_identity {
            if last_identity != 0 {
                info!(
                    "🔄 [ROTATION]: File identity changed ({} -> {}); resetting offset.",
                    last_identity, current_identity
                );
                rotation_detected = true;
            }
            read_offset = 0;
        }

        // 2. GUARDIA DE TRUNCAMIENTO (jamás seguir hacia atrás)
        if read_offset > current_size {
            info!(
                "✂️ [TRUNCATION]: Offset {} exceeds size {}; resetting to 0.",
                read_offset, current_size
            );
            read_offset = 0;
        }

        let file_handle = match File::open(&self.log_path) {
            Ok(handle) => handle,
            Err(open_fault) => {
                warn!("👁️ [TAILER_IDLE]: Open failed this tick: {}", open_fault);
                return TailReadOutcome::default();
            }
        };

        let mut buffered_reader = BufReader::new(file_handle);
        if buffered_reader.seek(SeekFrom::Start(read_offset)).is_err() {
            return TailReadOutcome::default();
        }

        // 3. LECTURA SECUENCIAL CON TOKENS DE POSICIÓN
        let mut outcome = TailReadOutcome {
            lines: Vec::new(),
            file_identity: current_identity,
            final_offset: read_offset,
            rotation_detected,
        };

        let mut line_buffer = String::new();
        loop {
            line_buffer.clear();
            let bytes_read = match buffered_reader.read_line(&mut line_buffer) {
                Ok(0) => break,
                Ok(bytes_read) => bytes_read,
                Err(read_fault) => {
                    warn!("👁️ [TAILER_FAULT]: Read interrupted: {}", read_fault);
                    break;
                }
            };

            outcome.final_offset += bytes_read as u64;

            let trimmed_line = line_buffer.trim_end_matches(['\n', '\r']);
            if trimmed_line.is_empty() {
                continue;
            }

            if is_ssh_relevant(trimmed_line) {
                outcome.lines.push(TailedLine {
                    content: trimmed_line.to_string(),
                    end_offset: outcome.final_offset,
                });
            }
        }

        if !outcome.lines.is_empty() {
            debug!("👁️ [TAILER]: {} relevant lines collected.", outcome.lines.len());
        }
        outcome
    }
}

fn is_ssh_relevant(line: &str) -> bool {
    SSH_RELEVANCE_MARKERS.iter().any(|marker| line.contains(marker))
}

#[cfg(unix)]
fn file_identity(metadata: &std::fs::Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    metadata.ino()
}

/// Plataformas sin inode: degradación a identidad por tamaño+mtime.
#[cfg(not(unix))]
fn file_identity(metadata: &std::fs::Metadata) -> u64 {
    metadata.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_log(path: &Path, content: &str) {
        let mut handle = File::create(path).expect("log file");
        handle.write_all(content.as_bytes()).expect("log content");
    }

    #[test]
    fn relevance_filter_keeps_ssh_lines_only() {
        assert!(is_ssh_relevant("Jan 1 sshd[1]: Failed password for root from 1.2.3.4 port 22"));
        assert!(is_ssh_relevant("Jan 1 sshd[1]: Connection closed by 1.2.3.4"));
        assert!(!is_ssh_relevant("Jan 1 cron[9]: (root) CMD (run-parts /etc/cron.hourly)"));
    }

    #[test]
    fn incremental_read_resumes_from_token() {
        let workspace = tempdir().expect("ephemeral dir");
        let log_path = workspace.path().join("auth.log");
        write_log(&log_path, "one sshd line\nnoise cron line\n");

        let tailer = LogTailer::new(log_path.clone());
        let first_pass = tailer.collect_new_lines(0, 0);
        assert_eq!(first_pass.lines.len(), 1);

        // Anexar una línea y re-leer desde el offset final.
        let mut handle = std::fs::OpenOptions::new().append(true).open(&log_path).expect("append");
        handle.write_all(b"second sshd line\n").expect("append content");

        let second_pass = tailer.collect_new_lines(first_pass.file_identity, first_pass.final_offset);
        assert_eq!(second_pass.lines.len(), 1);
        assert_eq!(second_pass.lines[0].content, "second sshd line");
    }

    #[test]
    fn truncation_resets_to_origin() {
        let workspace = tempdir().expect("ephemeral dir");
        let log_path = workspace.path().join("auth.log");
        write_log(&log_path, "sshd alpha\nsshd beta\n");

        let tailer = LogTailer::new(log_path.clone());
        let first_pass = tailer.collect_new_lines(0, 0);
        assert_eq!(first_pass.lines.len(), 2);

        // Truncar y escribir contenido más corto (copy-truncate).
        write_log(&log_path, "sshd gamma\n");
        let second_pass = tailer.collect_new_lines(first_pass.file_identity, first_pass.final_offset);
        assert_eq!(second_pass.lines.len(), 1);
        assert_eq!(second_pass.lines[0].content, "sshd gamma");
    }

    #[test]
    fn rotation_reads_fresh_file_from_zero() {
        let workspace = tempdir().expect("ephemeral dir");
        let log_path = workspace.path().join("auth.log");
        write_log(&log_path, "sshd old-world line\n");

        let tailer = LogTailer::new(log_path.clone());
        let first_pass = tailer.collect_new_lines(0, 0);
        assert_eq!(first_pass.lines.len(), 1);

        // Rotación: renombrar y crear archivo fresco (inode nuevo).
        let rotated_path = workspace.path().join("auth.log.1");
        std::fs::rename(&log_path, &rotated_path).expect("rotate");
        write_log(&log_path, "sshd new-world line\n");

        let second_pass = tailer.collect_new_lines(first_pass.file_identity, first_pass.final_offset);
        assert!(second_pass.rotation_detected);
        assert_eq!(second_pass.lines.len(), 1);
        assert_eq!(second_pass.lines[0].content, "sshd new-world line");
        // Ninguna línea del mundo viejo se re-lee.
        assert!(second_pass.lines.iter().all(|line| !line.content.contains("old-world")));
    }

    #[test]
    fn missing_file_yields_empty_pass() {
        let workspace = tempdir().expect("ephemeral dir");
        let tailer = LogTailer::new(workspace.path().join("absent.log"));
        let pass = tailer.collect_new_lines(0, 0);
        assert!(pass.lines.is_empty());
        assert_eq!(pass.final_offset, 0);
    }
}
