// [apps/ingest-server/src/state/wakeup_bus.rs]
/*!
 * =================================================================
 * APARATO: COMMAND WAKEUP BUS (V3.0 - NOTIFY STRATA)
 * CLASIFICACIÓN: APPLICATION STATE (ESTRATO L1-APP)
 * RESPONSABILIDAD: DESPERTAR DE SONDEOS LARGOS POR CENTINELA
 *
 * # Logic:
 * La cola autoritativa vive en el Ledger; este bus solo acorta la
 * latencia del long-poll. Un despertar perdido no pierde comandos: el
 * siguiente sondeo los reclama igual.
 * =================================================================
 */

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

#[derive(Default)]
pub struct CommandWakeupBus {
    channel_registry: Mutex<HashMap<String, Arc<Notify>>>,
}

impl CommandWakeupBus {
    pub fn new() -> Self {
        Self::default()
    }

    async fn channel_for(&self, agent_id: &str) -> Arc<Notify> {
        let mut registry_guard = self.channel_registry.lock().await;
        registry_guard.entry(agent_id.to_string()).or_insert_with(|| Arc::new(Notify::new())).clone()
    }

    /// Señala que hay comandos frescos para el centinela.
    pub async fn signal(&self, agent_id: &str) {
        self.channel_for(agent_id).await.notify_waiters();
    }

    /// Espera acotada a la próxima señal del centinela.
    pub async fn wait(&self, agent_id: &str, budget: std::time::Duration) {
        let channel = self.channel_for(agent_id).await;
        let _ = tokio::time::timeout(budget, channel.notified()).await;
    }
}
