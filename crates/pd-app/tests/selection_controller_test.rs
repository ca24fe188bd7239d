use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pd_app::{
    run_controller, DiscoveryStart, EventBus, LoopExit, SelectionController, SelectionPorts,
};
use pd_core::discovery::DiscoveryState;
use pd_core::ports::{
    CapabilitiesPort, ClockPort, DiscoveryPort, ProvisionalResolverPort, SelectionStorePort,
    TimerPort,
};
use pd_core::selection::{PersistedDestination, SelectionState};
use pd_core::{
    Capabilities, ConnectionStatus, Destination, DestinationDescriptor, DestinationEvent,
    DestinationKey, DestinationSettings, InboundEvent, Origin, ProvisionalType, SelectError,
    TimerToken,
};
use serde_json::json;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

#[derive(Default)]
struct RecordingTimer {
    armed: Mutex<HashMap<TimerToken, Duration>>,
}

impl RecordingTimer {
    fn is_armed(&self, token: TimerToken) -> bool {
        self.armed.lock().unwrap().contains_key(&token)
    }

    fn armed_for(&self, token: TimerToken) -> Option<Duration> {
        self.armed.lock().unwrap().get(&token).copied()
    }
}

impl TimerPort for RecordingTimer {
    fn schedule(&self, token: TimerToken, after: Duration) {
        self.armed.lock().unwrap().insert(token, after);
    }

    fn cancel(&self, token: TimerToken) {
        self.armed.lock().unwrap().remove(&token);
    }
}

#[derive(Default)]
struct RecordingDiscovery {
    started: Mutex<Vec<Origin>>,
    failing: BTreeSet<Origin>,
}

impl RecordingDiscovery {
    fn failing(origins: impl IntoIterator<Item = Origin>) -> Self {
        Self {
            started: Mutex::new(Vec::new()),
            failing: origins.into_iter().collect(),
        }
    }

    fn started(&self) -> Vec<Origin> {
        self.started.lock().unwrap().clone()
    }
}

impl DiscoveryPort for RecordingDiscovery {
    fn start_discovery(&self, origin: Origin) -> anyhow::Result<()> {
        self.started.lock().unwrap().push(origin);
        if self.failing.contains(&origin) {
            anyhow::bail!("{origin} backend unavailable");
        }
        Ok(())
    }
}

#[derive(Default)]
struct RecordingCapabilities {
    requested: Mutex<Vec<DestinationKey>>,
}

impl CapabilitiesPort for RecordingCapabilities {
    fn fetch_capabilities(&self, key: &DestinationKey) -> anyhow::Result<()> {
        self.requested.lock().unwrap().push(key.clone());
        Ok(())
    }
}

#[derive(Default)]
struct RecordingResolver {
    requested: Mutex<Vec<DestinationKey>>,
}

impl ProvisionalResolverPort for RecordingResolver {
    fn resolve_provisional(&self, key: &DestinationKey) -> anyhow::Result<()> {
        self.requested.lock().unwrap().push(key.clone());
        Ok(())
    }
}

#[derive(Default)]
struct MemoryStore {
    state: Mutex<SelectionState>,
}

impl MemoryStore {
    fn with_state(state: SelectionState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    fn selected(&self) -> Option<PersistedDestination> {
        self.state.lock().unwrap().selected.clone()
    }
}

impl SelectionStorePort for MemoryStore {
    fn persist_selection(&self, destination: &Destination) {
        self.state.lock().unwrap().record(destination, 3);
    }

    fn load_persisted_selection(&self) -> Option<PersistedDestination> {
        self.selected()
    }

    fn load_recent_destinations(&self) -> Vec<PersistedDestination> {
        self.state.lock().unwrap().recent.clone()
    }
}

struct ManualClock(AtomicI64);

impl ClockPort for ManualClock {
    fn now_ms(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

struct Harness {
    controller: SelectionController,
    events: mpsc::UnboundedReceiver<DestinationEvent>,
    timer: Arc<RecordingTimer>,
    discovery: Arc<RecordingDiscovery>,
    capabilities: Arc<RecordingCapabilities>,
    resolver: Arc<RecordingResolver>,
    store: Arc<MemoryStore>,
}

impl Harness {
    fn new(settings: DestinationSettings) -> Self {
        Self::with(settings, RecordingDiscovery::default(), MemoryStore::default())
    }

    fn with(
        settings: DestinationSettings,
        discovery: RecordingDiscovery,
        store: MemoryStore,
    ) -> Self {
        let timer = Arc::new(RecordingTimer::default());
        let discovery = Arc::new(discovery);
        let capabilities = Arc::new(RecordingCapabilities::default());
        let resolver = Arc::new(RecordingResolver::default());
        let store = Arc::new(store);

        let ports = SelectionPorts {
            discovery: discovery.clone(),
            capabilities: capabilities.clone(),
            store: store.clone(),
            provisional: resolver.clone(),
            timer: timer.clone(),
            clock: Arc::new(ManualClock(AtomicI64::new(42_000))),
        };
        let bus = EventBus::new();
        let events = bus.subscribe();

        Self {
            controller: SelectionController::new(settings, ports, bus),
            events,
            timer,
            discovery,
            capabilities,
            resolver,
            store,
        }
    }

    fn handle(&mut self, event: InboundEvent) {
        self.controller.handle(event).unwrap();
    }

    fn found(&mut self, origin: Origin, destinations: Vec<DestinationDescriptor>) {
        self.handle(InboundEvent::DestinationsFound {
            origin,
            destinations,
        });
    }

    fn drain(&mut self) -> Vec<DestinationEvent> {
        std::iter::from_fn(|| self.events.try_recv().ok()).collect()
    }

    fn selected_id(&self) -> Option<String> {
        self.controller
            .registry()
            .selected_key()
            .map(|key| key.id.clone())
    }
}

fn online(id: &str) -> DestinationDescriptor {
    DestinationDescriptor {
        id: id.to_string(),
        connection_status: ConnectionStatus::Online,
        ..Default::default()
    }
}

fn settings_with_origins(origins: &[Origin]) -> DestinationSettings {
    DestinationSettings {
        default_origins: origins.to_vec(),
        ..Default::default()
    }
}

fn local_key(id: &str) -> DestinationKey {
    DestinationKey::local(Origin::Local, id)
}

fn search_done(events: &[DestinationEvent], origin: Origin) -> Vec<bool> {
    events
        .iter()
        .filter_map(|event| match event {
            DestinationEvent::SearchDone {
                origin: o,
                timed_out,
            } if *o == origin => Some(*timed_out),
            _ => None,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Startup selection
// ---------------------------------------------------------------------------

#[test]
fn save_to_file_is_selected_once_every_search_is_done() {
    let mut h = Harness::new(settings_with_origins(&[Origin::Local, Origin::Privet]));
    h.controller.start();
    assert!(h.timer.is_armed(TimerToken::AutoSelect));

    h.found(Origin::Local, vec![online("printerA"), online("save_as_pdf")]);
    h.handle(InboundEvent::DiscoveryDone {
        origin: Origin::Local,
    });
    assert_eq!(h.selected_id(), None, "privet is still searching");

    h.handle(InboundEvent::TimerFired(TimerToken::DiscoveryDeadline {
        origin: Origin::Privet,
        run: 1,
    }));

    assert_eq!(h.selected_id().as_deref(), Some("save_as_pdf"));
    assert!(!h.controller.is_auto_selecting());
    assert!(!h.timer.is_armed(TimerToken::AutoSelect));
    assert_eq!(
        h.store.selected().map(|p| p.id),
        Some("save_as_pdf".to_string())
    );
}

#[test]
fn cloud_destination_reported_twice_is_merged() {
    let mut h = Harness::new(settings_with_origins(&[Origin::Cookies]));
    h.controller.start();

    let unknown = DestinationDescriptor {
        id: "cloud1".to_string(),
        account: "user@x".to_string(),
        ..Default::default()
    };
    let known = DestinationDescriptor {
        connection_status: ConnectionStatus::Online,
        ..unknown.clone()
    };
    h.found(Origin::Cookies, vec![unknown]);
    h.found(Origin::Cookies, vec![known]);

    let registry = h.controller.registry();
    assert_eq!(registry.len(), 1);
    let key = DestinationKey::new(Origin::Cookies, "cloud1", "user@x");
    assert_eq!(
        registry.get(&key).unwrap().connection_status,
        ConnectionStatus::Online
    );
}

#[test]
fn persisted_selection_is_restored_from_recent_placeholder() {
    let mut printer = Destination::new(Origin::Privet, "office", "", "Office printer")
        .with_capabilities(Capabilities::new(json!({"color": true})));
    printer.last_access_ms = Some(1_000);
    let mut state = SelectionState::default();
    state.record(&printer, 3);

    let mut h = Harness::with(
        DestinationSettings::default(),
        RecordingDiscovery::default(),
        MemoryStore::with_state(state),
    );
    h.controller.start();

    assert_eq!(h.selected_id().as_deref(), Some("office"));
    assert!(!h.controller.is_auto_selecting());
    assert!(!h.timer.is_armed(TimerToken::AutoSelect));
    assert!(h.capabilities.requested.lock().unwrap().is_empty());
    assert!(h
        .drain()
        .contains(&DestinationEvent::CapabilitiesReady { key: printer.key() }));
    assert_eq!(h.discovery.started(), vec![Origin::Local, Origin::Privet]);
}

#[test]
fn restored_selection_without_capabilities_falls_back_when_fetch_fails() {
    let mut state = SelectionState::default();
    state.record(&Destination::new(Origin::Local, "save_as_pdf", "", "Save as PDF"), 3);
    state.record(&Destination::new(Origin::Local, "hp", "", "HP"), 3);

    let mut h = Harness::with(
        DestinationSettings::default(),
        RecordingDiscovery::default(),
        MemoryStore::with_state(state),
    );
    h.controller.start();
    assert_eq!(h.selected_id().as_deref(), Some("hp"));
    assert_eq!(*h.capabilities.requested.lock().unwrap(), vec![local_key("hp")]);

    h.handle(InboundEvent::CapabilitiesFailed {
        key: local_key("hp"),
        reason: "printer unreachable".to_string(),
    });

    assert_eq!(h.selected_id().as_deref(), Some("save_as_pdf"));
}

#[test]
fn auto_select_timeout_prefers_system_default() {
    let settings = DestinationSettings {
        system_default_id: Some("hp".to_string()),
        default_selection_rules: Some(r#"{"kind": "privet", "idPattern": "^office"}"#.to_string()),
        ..Default::default()
    };
    let mut h = Harness::new(settings);
    h.controller.start();
    assert_eq!(h.discovery.started(), vec![Origin::Local, Origin::Privet]);
    assert_eq!(
        h.timer.armed_for(TimerToken::AutoSelect),
        Some(Duration::from_secs(15))
    );

    h.found(Origin::Local, vec![online("save_as_pdf"), online("hp")]);
    h.found(Origin::Privet, vec![online("home")]);
    assert_eq!(h.selected_id(), None);

    h.handle(InboundEvent::TimerFired(TimerToken::AutoSelect));

    assert_eq!(h.selected_id().as_deref(), Some("hp"));
    assert!(!h.controller.registry().has_pending_rule());
}

#[test]
fn default_rule_selects_first_match() {
    let settings = DestinationSettings {
        default_selection_rules: Some(r#"{"kind": "local", "namePattern": "Office"}"#.to_string()),
        ..Default::default()
    };
    let mut h = Harness::new(settings);
    h.controller.start();

    let mut upstairs = online("hp-2");
    upstairs.display_name = "Office upstairs".to_string();
    let mut downstairs = online("hp-1");
    downstairs.display_name = "Office downstairs".to_string();
    h.found(Origin::Local, vec![online("save_as_pdf"), upstairs, downstairs]);

    assert_eq!(h.selected_id().as_deref(), Some("hp-2"));
    assert!(!h.timer.is_armed(TimerToken::AutoSelect));
}

#[test]
fn finished_searches_trigger_fallback_before_timeout() {
    let settings = DestinationSettings {
        default_selection_rules: Some(r#"{"kind": "local", "idPattern": "^missing$"}"#.to_string()),
        ..Default::default()
    };
    let mut h = Harness::new(settings);
    h.controller.start();

    h.found(Origin::Local, vec![online("a"), online("b")]);
    assert_eq!(h.selected_id(), None);
    h.handle(InboundEvent::DiscoveryDone {
        origin: Origin::Local,
    });

    assert_eq!(h.selected_id().as_deref(), Some("a"));
    assert!(!h.timer.is_armed(TimerToken::AutoSelect));
}

#[test]
fn invalid_default_rules_are_ignored() {
    let settings = DestinationSettings {
        default_selection_rules: Some("{not json".to_string()),
        ..Default::default()
    };
    let mut h = Harness::new(settings);
    h.controller.start();

    assert!(!h.controller.registry().has_pending_rule());
    assert!(h.controller.is_auto_selecting());
}

#[test]
fn empty_fallback_reports_no_destinations_and_retries_later() {
    let mut h = Harness::with(
        DestinationSettings::default(),
        RecordingDiscovery::failing([Origin::Local]),
        MemoryStore::default(),
    );
    h.controller.start();

    let events = h.drain();
    assert_eq!(search_done(&events, Origin::Local), vec![false]);
    assert!(events.contains(&DestinationEvent::NoDestinationsFound));

    h.found(Origin::Local, vec![online("late")]);
    assert_eq!(h.selected_id().as_deref(), Some("late"));
}

// ---------------------------------------------------------------------------
// Discovery deadlines
// ---------------------------------------------------------------------------

#[test]
fn deadline_forces_completion_exactly_once() {
    let mut h = Harness::new(DestinationSettings::default());
    h.controller.start();
    assert_eq!(
        h.controller.start_discovery(Origin::Privet),
        DiscoveryStart::Started
    );
    let deadline = TimerToken::DiscoveryDeadline {
        origin: Origin::Privet,
        run: 1,
    };
    assert_eq!(h.timer.armed_for(deadline), Some(Duration::from_secs(5)));

    h.handle(InboundEvent::TimerFired(deadline));
    h.handle(InboundEvent::TimerFired(deadline));
    h.handle(InboundEvent::DiscoveryDone {
        origin: Origin::Privet,
    });

    assert_eq!(h.controller.tracker().state(Origin::Privet), DiscoveryState::Done);
    assert_eq!(search_done(&h.drain(), Origin::Privet), vec![true]);
}

#[test]
fn completion_cancels_the_deadline() {
    let mut h = Harness::new(DestinationSettings::default());
    h.controller.start();
    h.controller.start_discovery(Origin::Extension);
    let deadline = TimerToken::DiscoveryDeadline {
        origin: Origin::Extension,
        run: 1,
    };
    assert!(h.timer.is_armed(deadline));

    h.handle(InboundEvent::DiscoveryDone {
        origin: Origin::Extension,
    });

    assert!(!h.timer.is_armed(deadline));
    assert_eq!(search_done(&h.drain(), Origin::Extension), vec![false]);
}

#[test]
fn requery_replaces_the_previous_deadline() {
    let mut h = Harness::new(DestinationSettings::default());
    h.controller.start();
    h.controller.start_discovery(Origin::Privet);
    assert_eq!(
        h.controller.start_discovery(Origin::Privet),
        DiscoveryStart::Started
    );

    let first = TimerToken::DiscoveryDeadline {
        origin: Origin::Privet,
        run: 1,
    };
    let second = TimerToken::DiscoveryDeadline {
        origin: Origin::Privet,
        run: 2,
    };
    assert!(!h.timer.is_armed(first));
    assert!(h.timer.is_armed(second));

    h.handle(InboundEvent::TimerFired(first));
    assert!(h.controller.tracker().is_in_progress(Origin::Privet));

    h.handle(InboundEvent::TimerFired(second));
    assert_eq!(search_done(&h.drain(), Origin::Privet), vec![true]);
}

#[test]
fn local_search_is_not_restarted() {
    let mut h = Harness::new(DestinationSettings::default());
    h.controller.start();

    assert_eq!(
        h.controller.start_discovery(Origin::Local),
        DiscoveryStart::Unchanged
    );
    assert_eq!(h.discovery.started(), vec![Origin::Local]);
}

// ---------------------------------------------------------------------------
// User actions
// ---------------------------------------------------------------------------

#[test]
fn user_selection_ends_auto_select() {
    let mut h = Harness::new(DestinationSettings::default());
    h.controller.start();
    h.found(Origin::Local, vec![online("a"), online("b")]);

    h.handle(InboundEvent::UserSelected(Some(local_key("b"))));
    assert!(!h.timer.is_armed(TimerToken::AutoSelect));

    h.handle(InboundEvent::TimerFired(TimerToken::AutoSelect));
    assert_eq!(h.selected_id().as_deref(), Some("b"));
}

#[test]
fn selecting_unknown_destination_is_rejected() {
    let mut h = Harness::new(DestinationSettings::default());
    h.controller.start();

    let ghost = local_key("ghost");
    assert_eq!(
        h.controller.handle(InboundEvent::UserSelected(Some(ghost.clone()))),
        Err(SelectError::Unknown(ghost))
    );
    assert!(h.controller.is_auto_selecting());
}

#[test]
fn accounts_change_reloads_cloud_destinations() {
    let mut h = Harness::new(settings_with_origins(&[Origin::Local, Origin::Cookies]));
    h.controller.start();
    let cloud = DestinationDescriptor {
        account: "user@x".to_string(),
        ..online("cloud1")
    };
    h.found(Origin::Cookies, vec![cloud]);
    h.found(Origin::Local, vec![online("a")]);
    let cloud_key = DestinationKey::new(Origin::Cookies, "cloud1", "user@x");
    h.controller.select(Some(&cloud_key)).unwrap();
    h.drain();

    h.handle(InboundEvent::AccountsChanged);

    assert!(!h.controller.registry().contains(&cloud_key));
    assert_eq!(h.controller.registry().len(), 1);
    assert_eq!(h.selected_id().as_deref(), Some("a"));
    assert_eq!(
        h.discovery.started(),
        vec![Origin::Local, Origin::Cookies, Origin::Cookies]
    );
    let events = h.drain();
    let cleared = events
        .iter()
        .position(|e| *e == DestinationEvent::SelectionChanged { key: None });
    let reselected = events.iter().position(|e| {
        *e == DestinationEvent::SelectionChanged {
            key: Some(local_key("a")),
        }
    });
    assert!(cleared.is_some() && cleared < reselected);
    assert!(events.contains(&DestinationEvent::SearchStarted {
        origin: Origin::Cookies
    }));
}

// ---------------------------------------------------------------------------
// Provisional destinations
// ---------------------------------------------------------------------------

fn usb_descriptor() -> DestinationDescriptor {
    DestinationDescriptor {
        provisional_type: ProvisionalType::NeedsUsbPermission,
        ..online("usb")
    }
}

#[test]
fn resolved_provisional_destination_is_selected() {
    let mut h = Harness::new(settings_with_origins(&[Origin::Extension]));
    h.controller.start();
    h.found(Origin::Extension, vec![usb_descriptor()]);
    let usb = DestinationKey::local(Origin::Extension, "usb");

    h.controller.resolve_provisional(&usb).unwrap();
    assert_eq!(*h.resolver.requested.lock().unwrap(), vec![usb.clone()]);

    h.handle(InboundEvent::ProvisionalResolved {
        key: usb.clone(),
        destination: online("usb-1234"),
    });

    let resolved = DestinationKey::local(Origin::Extension, "usb-1234");
    assert_eq!(h.controller.registry().selected_key(), Some(&resolved));
    assert!(!h.controller.registry().contains(&usb));
    assert!(h.drain().contains(&DestinationEvent::ProvisionalResolved {
        provisional: usb,
        resolved,
    }));
}

#[test]
fn failed_provisional_destination_is_removed() {
    let mut h = Harness::new(settings_with_origins(&[Origin::Extension]));
    h.controller.start();
    h.found(Origin::Extension, vec![usb_descriptor(), online("other")]);
    let usb = DestinationKey::local(Origin::Extension, "usb");

    h.handle(InboundEvent::ProvisionalFailed { key: usb.clone() });

    assert!(!h.controller.registry().contains(&usb));
    assert!(h
        .drain()
        .contains(&DestinationEvent::ProvisionalResolutionFailed { key: usb }));
}

#[test]
fn only_provisional_destinations_can_be_resolved() {
    let mut h = Harness::new(settings_with_origins(&[Origin::Extension]));
    h.controller.start();
    h.found(Origin::Extension, vec![online("plain")]);
    let plain = DestinationKey::local(Origin::Extension, "plain");

    assert_eq!(
        h.controller.resolve_provisional(&plain),
        Err(SelectError::NotProvisional(plain))
    );
    assert!(h.resolver.requested.lock().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Event loop
// ---------------------------------------------------------------------------

#[tokio::test]
async fn event_loop_runs_until_a_destination_is_selected() {
    let mut h = Harness::new(DestinationSettings::default());
    h.controller.start();
    let (tx, mut rx) = mpsc::unbounded_channel();

    tx.send(InboundEvent::DestinationsFound {
        origin: Origin::Local,
        destinations: vec![online("a")],
    })
    .unwrap();
    tx.send(InboundEvent::UserSelected(Some(local_key("ghost"))))
        .unwrap();
    tx.send(InboundEvent::DiscoveryDone {
        origin: Origin::Local,
    })
    .unwrap();

    let exit = run_controller(&mut h.controller, &mut rx, |c| {
        c.registry().selected_key().is_some()
    })
    .await;

    assert_eq!(exit, LoopExit::Finished);
    assert_eq!(h.selected_id().as_deref(), Some("a"));

    drop(tx);
    let exit = run_controller(&mut h.controller, &mut rx, |_| false).await;
    assert_eq!(exit, LoopExit::Closed);
}
