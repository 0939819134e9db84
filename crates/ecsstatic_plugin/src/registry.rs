use std::collections::HashMap;
use std::collections::HashSet;

use crossbeam_channel::Receiver;
use crossbeam_channel::Sender;
use indexmap::IndexMap;
use parking_lot::Mutex;
use parking_lot::RwLock;

/// Change notifications for consumers holding registered stylesheets
#[derive(Clone, Debug, PartialEq)]
pub enum RegistryEvent {
  /// Stylesheets previously registered by `source` that are gone after it was re-transformed
  Invalidated { source: String, ids: Vec<String> },
  /// Every stylesheet was dropped
  Cleared,
}

#[derive(Debug, Default)]
struct RegistryState {
  styles: IndexMap<String, String>,
  /// Sources that registered each id; ids are content addressed so several files can share one
  owners: HashMap<String, HashSet<String>>,
  by_source: HashMap<String, Vec<String>>,
}

impl RegistryState {
  fn insert(&mut self, source: &str, id: String, css: String) {
    self.owners.entry(id.clone()).or_default().insert(source.to_string());
    let ids = self.by_source.entry(source.to_string()).or_default();
    if !ids.contains(&id) {
      ids.push(id.clone());
    }
    self.styles.insert(id, css);
  }

  /// Drop the ownership of `source`, returning the ids no other source holds
  fn release(&mut self, source: &str) -> Vec<String> {
    let mut removed = Vec::new();

    for id in self.by_source.remove(source).unwrap_or_default() {
      let orphaned = match self.owners.get_mut(&id) {
        Some(owners) => {
          owners.remove(source);
          owners.is_empty()
        }
        None => true,
      };
      if orphaned {
        self.owners.remove(&id);
        self.styles.shift_remove(&id);
        removed.push(id);
      }
    }

    removed
  }
}

/// Generated stylesheets of one build, keyed by virtual id
///
/// Safe to share between concurrent per-file transforms. Each source file owns the ids it
/// registered so a re-transform replaces exactly that file's entries.
#[derive(Debug, Default)]
pub struct StyleRegistry {
  state: RwLock<RegistryState>,
  subscribers: Mutex<Vec<Sender<RegistryEvent>>>,
}

impl StyleRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register one stylesheet for `source`
  ///
  /// Ids are derived from content, so writing an existing id again stores equal text.
  pub fn insert(&self, source: &str, id: impl Into<String>, css: impl Into<String>) {
    self.state.write().insert(source, id.into(), css.into());
  }

  pub fn get(&self, id: &str) -> Option<String> {
    self.state.read().styles.get(id).cloned()
  }

  pub fn contains(&self, id: &str) -> bool {
    self.state.read().styles.contains_key(id)
  }

  pub fn len(&self) -> usize {
    self.state.read().styles.len()
  }

  pub fn is_empty(&self) -> bool {
    self.state.read().styles.is_empty()
  }

  /// All registered stylesheets, in registration order
  pub fn entries(&self) -> Vec<(String, String)> {
    self
      .state
      .read()
      .styles
      .iter()
      .map(|(id, css)| (id.clone(), css.clone()))
      .collect()
  }

  /// Ids currently registered by `source`
  pub fn ids_for_source(&self, source: &str) -> Vec<String> {
    self
      .state
      .read()
      .by_source
      .get(source)
      .cloned()
      .unwrap_or_default()
  }

  /// Replace everything `source` registered with `entries`
  ///
  /// Subscribers are told about ids that are no longer registered by anyone.
  pub fn replace_for_source(&self, source: &str, entries: impl IntoIterator<Item = (String, String)>) {
    let removed = {
      let mut state = self.state.write();
      let released = state.release(source);
      let mut kept = HashSet::new();
      for (id, css) in entries {
        kept.insert(id.clone());
        state.insert(source, id, css);
      }
      released
        .into_iter()
        .filter(|id| !kept.contains(id))
        .collect::<Vec<_>>()
    };

    if !removed.is_empty() {
      self.publish(RegistryEvent::Invalidated {
        source: source.to_string(),
        ids: removed,
      });
    }
  }

  /// Drop everything `source` registered, returning the ids that were removed
  pub fn invalidate_source(&self, source: &str) -> Vec<String> {
    let removed = self.state.write().release(source);

    if !removed.is_empty() {
      tracing::debug!(source, ids = ?removed, "Invalidated stylesheets");
      self.publish(RegistryEvent::Invalidated {
        source: source.to_string(),
        ids: removed.clone(),
      });
    }
    removed
  }

  pub fn clear(&self) {
    {
      let mut state = self.state.write();
      *state = RegistryState::default();
    }
    self.publish(RegistryEvent::Cleared);
  }

  /// Receive every event published from now on
  pub fn subscribe(&self) -> Receiver<RegistryEvent> {
    let (sender, receiver) = crossbeam_channel::unbounded();
    self.subscribers.lock().push(sender);
    receiver
  }

  fn publish(&self, event: RegistryEvent) {
    // Subscribers that dropped their receiver are forgotten
    self
      .subscribers
      .lock()
      .retain(|subscriber| subscriber.send(event.clone()).is_ok());
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use pretty_assertions::assert_eq;

  use super::*;

  #[test]
  fn stores_and_returns_stylesheets() {
    let registry = StyleRegistry::new();
    registry.insert("/app/a.tsx", "/app/x.acab.css", ".x{color:red}");

    assert!(registry.contains("/app/x.acab.css"));
    assert_eq!(registry.get("/app/x.acab.css"), Some(".x{color:red}".to_string()));
    assert_eq!(registry.get("/app/y.acab.css"), None);
  }

  #[test]
  fn replaces_only_the_entries_of_one_source() {
    let registry = StyleRegistry::new();
    let events = registry.subscribe();
    registry.insert("/app/a.tsx", "/app/a1.acab.css", "a1");
    registry.insert("/app/b.tsx", "/app/b1.acab.css", "b1");

    registry.replace_for_source("/app/a.tsx", vec![("/app/a2.acab.css".to_string(), "a2".to_string())]);

    assert!(!registry.contains("/app/a1.acab.css"));
    assert!(registry.contains("/app/a2.acab.css"));
    assert!(registry.contains("/app/b1.acab.css"));
    assert_eq!(
      events.try_recv(),
      Ok(RegistryEvent::Invalidated {
        source: "/app/a.tsx".into(),
        ids: vec!["/app/a1.acab.css".into()],
      })
    );
  }

  #[test]
  fn keeps_stylesheets_shared_with_other_sources() {
    let registry = StyleRegistry::new();
    registry.insert("/app/a.tsx", "/app/shared.acab.css", "s");
    registry.insert("/app/b.tsx", "/app/shared.acab.css", "s");

    assert_eq!(registry.invalidate_source("/app/a.tsx"), Vec::<String>::new());
    assert!(registry.contains("/app/shared.acab.css"));

    assert_eq!(
      registry.invalidate_source("/app/b.tsx"),
      vec!["/app/shared.acab.css".to_string()]
    );
    assert!(registry.is_empty());
  }

  #[test]
  fn unchanged_entries_are_not_reported() {
    let registry = StyleRegistry::new();
    let events = registry.subscribe();
    registry.insert("/app/a.tsx", "/app/a1.acab.css", "a1");

    registry.replace_for_source("/app/a.tsx", vec![("/app/a1.acab.css".to_string(), "a1".to_string())]);

    assert!(registry.contains("/app/a1.acab.css"));
    assert!(events.try_recv().is_err());
  }

  #[test]
  fn clear_drops_everything_and_notifies() {
    let registry = StyleRegistry::new();
    let events = registry.subscribe();
    registry.insert("/app/a.tsx", "/app/a1.acab.css", "a1");

    registry.clear();

    assert!(registry.is_empty());
    assert!(registry.ids_for_source("/app/a.tsx").is_empty());
    assert_eq!(events.try_recv(), Ok(RegistryEvent::Cleared));
  }

  #[test]
  fn accepts_concurrent_inserts() {
    let registry = Arc::new(StyleRegistry::new());

    let handles: Vec<_> = (0..8)
      .map(|index| {
        let registry = registry.clone();
        std::thread::spawn(move || {
          let source = format!("/app/{}.tsx", index);
          registry.insert(&source, format!("/app/{}.acab.css", index), "x");
          registry.insert(&source, "/app/shared.acab.css", "shared");
        })
      })
      .collect();
    for handle in handles {
      handle.join().unwrap();
    }

    assert_eq!(registry.len(), 9);
    assert_eq!(registry.get("/app/shared.acab.css"), Some("shared".to_string()));
  }
}
