// [tests/mirror/apps/sentinel_agent/tailer_rotation.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE ROTACIÓN DEL VIGÍA (V4.0 - ZENITH)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L1-MIRROR
 * RESPONSABILIDAD: SEGURIDAD DE ROTACIÓN Y TRUNCAMIENTO DEL VIGÍA
 *
 * # Mathematical Proof (Rotation Safety):
 * Con offset confirmado en el archivo viejo, la rotación (identidad
 * nueva) reinicia el offset a 0 y lee el archivo fresco completo; las
 * líneas del mundo viejo jamás se re-leen.
 * =================================================================
 */

use guardian_sentinel_lib::state::TailPositionState;
use guardian_sentinel_lib::tailer::LogTailer;
use std::fs;
use std::io::Write;
use std::path::Path;

fn write_document(path: &Path, content: &str) {
    let mut handle = fs::File::create(path).expect("log file");
    handle.write_all(content.as_bytes()).expect("log content");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    /**
     * ESCENARIO DE ACEPTACIÓN: offset 4096 confirmado, rotación con
     * archivo fresco de 200 bytes => lectura completa desde 0, sin
     * re-lectura del mundo viejo.
     */
    #[test]
    fn certify_rotation_reads_fresh_file_completely() {
        println!("\n🔄 [INICIO]: Auditoría de Seguridad de Rotación V4.0...");
        let workspace = tempdir().expect("ephemeral dir");
        let log_path = workspace.path().join("auth.log");

        // FASE 1: Mundo viejo de exactamente 4096 bytes.
        println!("   🧪 Fase 1: Confirmando offset 4096 en el mundo viejo...");
        let old_line = "Jan 10 03:14:07 bastion sshd[991]: Failed password for root from 203.0.113.5 port 51022 ssh2 OLDWORLD padded line\n";
        let repetitions = 4096 / old_line.len();
        let mut old_world = old_line.repeat(repetitions);
        old_world.push_str(&"x".repeat(4096 - old_world.len() - 1));
        old_world.push('\n');
        assert_eq!(old_world.len(), 4096);
        write_document(&log_path, &old_world);

        let tailer = LogTailer::new(log_path.clone());
        let first_pass = tailer.collect_new_lines(0, 0);
        assert_eq!(first_pass.final_offset, 4096);

        let mut state = TailPositionState::default();
        state.last_inode = first_pass.file_identity;
        state.last_position = first_pass.final_offset;
        let state_path = workspace.path().join("agent-state.json");
        state.save(&state_path).expect("state sealed");

        // FASE 2: Rotación con archivo fresco de 200 bytes.
        println!("   🧪 Fase 2: Rotando hacia un archivo fresco de 200 bytes...");
        fs::rename(&log_path, workspace.path().join("auth.log.1")).expect("rotation");
        let mut fresh_line = String::from(
            "Jan 10 03:20:00 bastion sshd[999]: Accepted password for deploy from 192.0.2.44 port 58814 ssh2 NEWWORLD ",
        );
        fresh_line.push_str(&"p".repeat(200 - fresh_line.len() - 1));
        fresh_line.push('\n');
        assert_eq!(fresh_line.len(), 200);
        write_document(&log_path, &fresh_line);

        // FASE 3: El vigía reinicia y lee los 200 bytes completos.
        println!("   🧪 Fase 3: Verificando la lectura completa del mundo nuevo...");
        let replayed_state = TailPositionState::load(&state_path);
        let second_pass =
            tailer.collect_new_lines(replayed_state.last_inode, replayed_state.last_position);

        assert!(second_pass.rotation_detected, "identity change must be observed");
        assert_eq!(second_pass.final_offset, 200, "the fresh file is read completely");
        assert_eq!(second_pass.lines.len(), 1);
        assert!(second_pass.lines[0].content.contains("NEWWORLD"));
        assert!(
            second_pass.lines.iter().all(|line| !line.content.contains("OLDWORLD")),
            "old world lines are never re-read"
        );

        println!("🏁 [INFORME]: Seguridad de Rotación certificada GOLD_MASTER.");
    }

    /**
     * CERTIFICACIÓN: Mismo inode con tamaño menor que el offset =>
     * reinicio a 0 (truncamiento in-situ).
     */
    #[test]
    fn certify_in_place_truncation_resets_offset() {
        let workspace = tempdir().expect("ephemeral dir");
        let log_path = workspace.path().join("auth.log");
        write_document(&log_path, "sshd alpha line\nsshd beta line\n");

        let tailer = LogTailer::new(log_path.clone());
        let first_pass = tailer.collect_new_lines(0, 0);
        assert_eq!(first_pass.lines.len(), 2);

        write_document(&log_path, "sshd gamma line\n");
        let second_pass =
            tailer.collect_new_lines(first_pass.file_identity, first_pass.final_offset);
        assert_eq!(second_pass.lines.len(), 1);
        assert_eq!(second_pass.lines[0].content, "sshd gamma line");
    }

    /**
     * CERTIFICACIÓN: El avance por rebanada usa el token de cada línea.
     */
    #[test]
    fn certify_position_tokens_advance_per_line() {
        let workspace = tempdir().expect("ephemeral dir");
        let log_path = workspace.path().join("auth.log");
        write_document(&log_path, "sshd line one\nsshd line two\nsshd line three\n");

        let tailer = LogTailer::new(log_path.clone());
        let pass = tailer.collect_new_lines(0, 0);
        assert_eq!(pass.lines.len(), 3);

        // Confirmar solo hasta la segunda línea y re-leer desde su token.
        let confirmed_offset = pass.lines[1].end_offset;
        let resumed_pass = tailer.collect_new_lines(pass.file_identity, confirmed_offset);
        assert_eq!(resumed_pass.lines.len(), 1);
        assert_eq!(resumed_pass.lines[0].content, "sshd line three");
    }
}
