// [apps/sentinel-agent/src/metrics.rs]
/*!
 * =================================================================
 * APARATO: HOST BIOMETRICS MONITOR (V5.0 - SILICON VITALS)
 * CLASIFICACIÓN: WORKER SUPPORT (ESTRATO L1-WORKER)
 * RESPONSABILIDAD: CAPTURA INSTANTÁNEA DE CPU/MEMORIA/DISCO/UPTIME
 * =================================================================
 */

use guardian_domain_models::agent::{AgentHealth, HostMetrics};
use sysinfo::{Disks, System};

/// Umbral de degradación (cualquier recurso por encima).
const DEGRADED_THRESHOLD_PERCENT: f32 = 85.0;
/// Umbral crítico de salud.
const UNHEALTHY_THRESHOLD_PERCENT: f32 = 95.0;

pub struct HostMonitor;

impl HostMonitor {
    /// Biometría instantánea del hospedaje para el latido.
    pub fn capture_instantaneous_metrics() -> HostMetrics {
        let mut system = System::new_all();
        system.refresh_all();

        let cpu_percent = system.global_cpu_info().cpu_usage();

        let memory_percent = if system.total_memory() > 0 {
            (system.used_memory() as f32 / system.total_memory() as f32) * 100.0
        } else {
            0.0
        };

        // Disco raíz (o el de mayor ocupación si '/' no se distingue).
        let disks = Disks::new_with_refreshed_list();
        let disk_percent = disks
            .iter()
            .filter(|disk| disk.total_space() > 0)
            .map(|disk| {
                let used = disk.total_space() - disk.available_space();
                (used as f32 / disk.total_space() as f32) * 100.0
            })
            .fold(0.0f32, f32::max);

        HostMetrics {
            cpu_percent,
            memory_percent,
            disk_percent,
            uptime_seconds: System::uptime(),
        }
    }

    /// Etiqueta de salud derivada de la biometría.
    pub fn derive_health(metrics: &HostMetrics) -> AgentHealth {
        let worst_pressure = metrics
            .cpu_percent
            .max(metrics.memory_percent)
            .max(metrics.disk_percent);

        if worst_pressure >= UNHEALTHY_THRESHOLD_PERCENT {
            AgentHealth::Unhealthy
        } else if worst_pressure >= DEGRADED_THRESHOLD_PERCENT {
            AgentHealth::Degraded
        } else {
            AgentHealth::Healthy
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_bands_follow_pressure() {
        let calm = HostMetrics {
            cpu_percent: 10.0,
            memory_percent: 40.0,
            disk_percent: 50.0,
            uptime_seconds: 3600,
        };
        assert_eq!(HostMonitor::derive_health(&calm), AgentHealth::Healthy);

        let stressed = HostMetrics { memory_percent: 90.0, ..calm.clone() };
        assert_eq!(HostMonitor::derive_health(&stressed), AgentHealth::Degraded);

        let collapsing = HostMetrics { disk_percent: 97.0, ..calm };
        assert_eq!(HostMonitor::derive_health(&collapsing), AgentHealth::Unhealthy);
    }
}
