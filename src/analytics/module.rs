use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_lock::OnceCell;
use serde_json::{json, Map, Value};

use crate::analytics::api::{initialize_provider, AnalyticsProvider, NoopAnalytics};
use crate::analytics::command::TrackerTarget;
use crate::analytics::config::ModuleConfig;
use crate::analytics::constants::USER_ID_RESOLVE_DELAY;
use crate::analytics::error::AnalyticsResult;
use crate::analytics::format::truthy_text;
use crate::analytics::sink::{AnalyticsSink, TestModeSink};
use crate::analytics::state_events::{SetEventSignal, StateEventMapper};
use crate::host::{StateChange, StateReader};
use crate::platform::runtime::{sleep, spawn_detached};

/// Host-facing analytics module.
///
/// Owns the provider, the declarative event mapper and the `<name>.setEvent` dispatch point.
/// The host calls [`on_model_initialized`](Self::on_model_initialized) once the state model is
/// ready and [`on_flush`](Self::on_flush) with every change batch.
pub struct AnalyticsModule {
    name: String,
    provider: Arc<dyn AnalyticsProvider>,
    set_event: SetEventSignal,
    mapper: StateEventMapper,
    user_id_path: Option<Vec<String>>,
    user_id: Arc<OnceCell<Option<String>>>,
    model_initialized: AtomicBool,
}

impl fmt::Debug for AnalyticsModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyticsModule")
            .field("name", &self.name)
            .field("provider", &self.provider)
            .field("mapper", &self.mapper)
            .field("user_id_path", &self.user_id_path)
            .finish_non_exhaustive()
    }
}

impl AnalyticsModule {
    /// Builds the module and initializes its trackers.
    ///
    /// A configuration without `tracking` yields a module backed by [`NoopAnalytics`]; its event
    /// mapping is still compiled and validated.
    pub fn new(
        name: impl Into<String>,
        config: ModuleConfig,
        live_sink: Option<Arc<dyn AnalyticsSink>>,
    ) -> AnalyticsResult<Self> {
        let name = name.into();
        let mapper = StateEventMapper::from_descriptors(&config.events)?;

        let provider: Arc<dyn AnalyticsProvider> = if config.tracking.is_some() {
            initialize_provider(&config.tracker_configs(), config.provider_options(), live_sink)?
        } else {
            log::warn!("analytics module {name} has no tracking id; analytics is disabled");
            Arc::new(NoopAnalytics)
        };

        Ok(Self::assemble(name, provider, mapper, config.user_id_path()))
    }

    /// Loads the configuration from `GA_PROVIDER_CONFIG`; a missing variable yields a disabled module.
    pub fn from_env(name: impl Into<String>, live_sink: Option<Arc<dyn AnalyticsSink>>) -> AnalyticsResult<Self> {
        match ModuleConfig::from_env()? {
            Some(config) => Self::new(name, config, live_sink),
            None => Ok(Self::disabled(name)),
        }
    }

    pub fn disabled(name: impl Into<String>) -> Self {
        Self::assemble(name.into(), Arc::new(NoopAnalytics), StateEventMapper::default(), None)
    }

    fn assemble(
        name: String,
        provider: Arc<dyn AnalyticsProvider>,
        mapper: StateEventMapper,
        user_id_path: Option<Vec<String>>,
    ) -> Self {
        let user_id = match user_id_path {
            Some(_) => OnceCell::new(),
            None => OnceCell::from(None),
        };
        Self {
            set_event: SetEventSignal::new(&name, provider.clone()),
            name,
            provider,
            mapper,
            user_id_path,
            user_id: Arc::new(user_id),
            model_initialized: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn provider(&self) -> Arc<dyn AnalyticsProvider> {
        self.provider.clone()
    }

    pub fn set_event_signal(&self) -> &SetEventSignal {
        &self.set_event
    }

    pub fn mapper(&self) -> &StateEventMapper {
        &self.mapper
    }

    /// Commands captured so far, when the module runs in test mode.
    pub fn test_capture(&self) -> Option<TestModeSink> {
        self.provider.test_capture()
    }

    /// Fires a synthetic event through the shared `setEvent` dispatch point.
    pub fn set_event(&self, props: Map<String, Value>) -> AnalyticsResult<()> {
        self.set_event.fire(props)
    }

    /// Schedules the user-id lookup. Only the first call has any effect.
    ///
    /// The lookup runs in the background after a short delay and applies `set {userId}` when the
    /// configured state path holds a truthy value. Commands issued before it completes carry no
    /// user id.
    pub fn on_model_initialized(&self, state: Arc<dyn StateReader>) {
        if self.model_initialized.swap(true, Ordering::SeqCst) {
            return;
        }
        let Some(path) = self.user_id_path.clone() else {
            return;
        };

        let provider = self.provider.clone();
        let cell = self.user_id.clone();
        spawn_detached(async move {
            sleep(USER_ID_RESOLVE_DELAY).await;
            let user_id = truthy_text(state.get(&path).as_ref());
            if let Some(id) = user_id.as_deref() {
                if let Err(err) = provider.set(&json!({ "userId": id }), &TrackerTarget::none()) {
                    log::warn!("failed to apply resolved user id: {err}");
                }
            } else {
                log::debug!("no user id found at {}", path.join("."));
            }
            let _ = cell.set(user_id).await;
        });
    }

    /// Waits for the user-id lookup scheduled by
    /// [`on_model_initialized`](Self::on_model_initialized).
    ///
    /// Resolves immediately with `None` when no `gaOptions.userId` path is configured. Otherwise it
    /// does not resolve until the model has been initialized.
    pub async fn resolved_user_id(&self) -> Option<String> {
        self.user_id.wait().await.clone()
    }

    /// Handles one change batch, returning the number of synthetic events fired.
    pub fn on_flush(&self, changes: &[StateChange], state: &dyn StateReader) -> AnalyticsResult<usize> {
        if self.mapper.is_empty() {
            return Ok(0);
        }
        self.mapper.on_flush(changes, state, &self.set_event)
    }
}
