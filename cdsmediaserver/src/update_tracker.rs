//! Suivi des UpdateID (SystemUpdateID et ContainerUpdateIDs).
//!
//! Chaque conteneur parcouru reçoit un enregistrement (update id, nombre
//! d'enfants observé). Un changement du nombre d'enfants, ou un
//! [`UpdateTracker::bump_container`] explicite, incrémente son update id, le
//! place dans l'ensemble des conteneurs en attente et réarme le timer de
//! coalescence. À l'expiration du timer, l'ensemble est vidé vers
//! `ContainerUpdateIDs` et le notifier (l'eventing UPnP) est appelé.
//!
//! Tant que des connexions sont actives les notifications sont différées ;
//! elles repartent quand le nombre de connexions retombe à zéro.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::object_ids::ROOT_ID;

/// Appelé quand les variables d'état évènementielles ont changé
pub type Notifier = Arc<dyn Fn() + Send + Sync>;

/// Version connue d'un conteneur
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerRecord {
    pub update_id: u32,
    pub total_matches: usize,
}

#[derive(Debug)]
struct State {
    system_update_id: u32,
    records: HashMap<String, ContainerRecord>,
    pending: BTreeSet<String>,
    last_flushed: Vec<(String, u32)>,
    allow_flush: bool,
    /// Un flush a été refusé pendant des connexions actives
    deferred: bool,
    timer: Option<JoinHandle<()>>,
}

struct Inner {
    state: Mutex<State>,
    interval: Duration,
    notifier: Mutex<Option<Notifier>>,
}

/// Registre des versions de conteneurs, partagé entre requêtes
#[derive(Clone)]
pub struct UpdateTracker {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for UpdateTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateTracker")
            .field("state", &self.inner.state)
            .field("interval", &self.inner.interval)
            .finish()
    }
}

impl UpdateTracker {
    pub fn new(interval: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    system_update_id: 0,
                    records: HashMap::new(),
                    pending: BTreeSet::new(),
                    last_flushed: Vec::new(),
                    allow_flush: true,
                    deferred: false,
                    timer: None,
                }),
                interval,
                notifier: Mutex::new(None),
            }),
        }
    }

    pub fn set_notifier(&self, notifier: Notifier) {
        *self.inner.notifier.lock() = Some(notifier);
    }

    pub fn system_update_id(&self) -> u32 {
        self.inner.state.lock().system_update_id
    }

    /// Initialise le SystemUpdateID au démarrage du service.
    ///
    /// La valeur doit différer de la précédente pour que les clients
    /// invalident leurs caches : si elle est identique, elle est incrémentée.
    pub fn seed_system_update_id(&self, seed: u32) {
        let mut state = self.inner.state.lock();
        state.system_update_id = if seed == state.system_update_id {
            seed.wrapping_add(1)
        } else {
            seed
        };
    }

    /// Enregistre le résultat d'un parcours de `object_id` et retourne
    /// l'update id applicable.
    ///
    /// Seule la première page (`start == 0`) peut faire évoluer la version :
    /// le nombre d'enfants des pages suivantes n'est pas fiable.
    pub fn observe_browse(&self, object_id: &str, start: usize, total_matches: usize) -> u32 {
        if object_id == ROOT_ID {
            return self.system_update_id();
        }

        let changed = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            let system_update_id = state.system_update_id;
            match state.records.get_mut(object_id) {
                Some(record) if start == 0 && record.total_matches != total_matches => {
                    record.update_id = record.update_id.wrapping_add(1);
                    record.total_matches = total_matches;
                    let update_id = record.update_id;
                    state.pending.insert(object_id.to_string());
                    state.system_update_id = state.system_update_id.wrapping_add(1);
                    debug!(
                        object_id = %object_id,
                        update_id,
                        total_matches,
                        "Container content changed"
                    );
                    Some(update_id)
                }
                Some(record) => return record.update_id,
                None => {
                    state.records.insert(
                        object_id.to_string(),
                        ContainerRecord {
                            update_id: system_update_id,
                            total_matches,
                        },
                    );
                    return system_update_id;
                }
            }
        };

        self.arm();
        changed.unwrap_or_default()
    }

    /// Update id courant d'un conteneur, ou le SystemUpdateID s'il n'a
    /// jamais été parcouru.
    pub fn current_update_id(&self, object_id: &str) -> u32 {
        let state = self.inner.state.lock();
        state
            .records
            .get(object_id)
            .map(|r| r.update_id)
            .unwrap_or(state.system_update_id)
    }

    pub fn record(&self, object_id: &str) -> Option<ContainerRecord> {
        self.inner.state.lock().records.get(object_id).copied()
    }

    /// Incrémente le SystemUpdateID et réarme le timer
    pub fn bump_system(&self) {
        {
            let mut state = self.inner.state.lock();
            state.system_update_id = state.system_update_id.wrapping_add(1);
        }
        self.arm();
    }

    /// Marque un conteneur connu comme modifié. Retourne `false` si le
    /// conteneur n'a jamais été parcouru (aucun client ne peut le cacher).
    pub fn bump_container(&self, object_id: &str) -> bool {
        {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            let Some(record) = state.records.get_mut(object_id) else {
                return false;
            };
            record.update_id = record.update_id.wrapping_add(1);
            state.pending.insert(object_id.to_string());
            state.system_update_id = state.system_update_id.wrapping_add(1);
        }
        self.arm();
        true
    }

    /// Nombre de connexions actives : les notifications sont différées
    /// tant qu'il n'est pas nul.
    pub fn connections_changed(&self, count: usize) {
        let (allow, waiting) = {
            let mut state = self.inner.state.lock();
            state.allow_flush = count == 0;
            (state.allow_flush, state.deferred || !state.pending.is_empty())
        };
        debug!(count, allow, "Connection count changed");
        // un bump_system différé n'a rien dans `pending`
        if allow && waiting {
            self.arm();
        }
    }

    /// Vide l'ensemble des conteneurs en attente
    pub fn drain_pending(&self) -> Vec<(String, u32)> {
        let mut state = self.inner.state.lock();
        let pending = std::mem::take(&mut state.pending);
        pending
            .into_iter()
            .map(|id| {
                let update_id = state.records.get(&id).map(|r| r.update_id).unwrap_or(0);
                (id, update_id)
            })
            .collect()
    }

    pub fn pending(&self) -> Vec<String> {
        self.inner.state.lock().pending.iter().cloned().collect()
    }

    /// Publie les changements en attente. Sans effet tant que des
    /// connexions sont actives.
    pub fn flush(&self) -> bool {
        Self::flush_inner(&self.inner)
    }

    fn flush_inner(inner: &Inner) -> bool {
        {
            let mut state = inner.state.lock();
            state.timer = None;
            if !state.allow_flush {
                trace!("Flush deferred, connections active");
                state.deferred = true;
                return false;
            }
            state.deferred = false;
            let pending = std::mem::take(&mut state.pending);
            let mut flushed = Vec::with_capacity(pending.len());
            for id in pending {
                let update_id = state.records.get(&id).map(|r| r.update_id).unwrap_or(0);
                flushed.push((id, update_id));
            }
            state.last_flushed = flushed;
        }

        let notifier = inner.notifier.lock().clone();
        if let Some(notify) = notifier {
            notify();
        }
        true
    }

    /// Valeur de `ContainerUpdateIDs` : `id,update_id` séparés par des virgules
    pub fn container_update_ids(&self) -> String {
        let state = self.inner.state.lock();
        state
            .last_flushed
            .iter()
            .map(|(id, update_id)| format!("{id},{update_id}"))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Oublie tout l'état (arrêt du service)
    pub fn clear(&self) {
        let mut state = self.inner.state.lock();
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        state.records.clear();
        state.pending.clear();
        state.last_flushed.clear();
        state.allow_flush = true;
        state.deferred = false;
    }

    /// (Ré)arme le timer de coalescence. Hors runtime tokio, la
    /// publication est immédiate.
    fn arm(&self) {
        let Ok(handle) = Handle::try_current() else {
            self.flush();
            return;
        };

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let interval = self.inner.interval;
        let mut state = self.inner.state.lock();
        if let Some(previous) = state.timer.take() {
            previous.abort();
        }
        state.timer = Some(handle.spawn(async move {
            tokio::time::sleep(interval).await;
            if let Some(inner) = weak.upgrade() {
                Self::flush_inner(&inner);
            }
        }));
    }
}

impl Default for UpdateTracker {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(timer) = self.state.get_mut().timer.take() {
            timer.abort();
        }
    }
}
