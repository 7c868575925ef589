//! Location provider contract and a manually driven implementation.
//!
//! The engine only *observes* a location provider: it reads the cached fix and
//! the authorization state, and asks the provider to request permission or a
//! fresh fix. Whatever drives the provider (platform callbacks, a demo, a test)
//! lives outside the engine.

use std::{
    fmt,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use tracing::{debug, info};

use crate::model::{BiasRegion, Coordinate};

/// Authorization for location access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthorizationState {
    /// The user has not been asked yet.
    #[default]
    NotDetermined,
    Authorized,
    Denied,
    /// Blocked by policy (parental controls, MDM, ...). Treated like `Denied`.
    Restricted,
}

impl AuthorizationState {
    pub const fn is_authorized(self) -> bool {
        matches!(self, Self::Authorized)
    }
}

impl fmt::Display for AuthorizationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotDetermined => write!(f, "NotDetermined"),
            Self::Authorized => write!(f, "Authorized"),
            Self::Denied => write!(f, "Denied"),
            Self::Restricted => write!(f, "Restricted"),
        }
    }
}

/// Supplies the current coordinate and authorization state.
pub trait LocationProvider: Send + Sync {
    /// The cached fix, `None` until one has been obtained.
    fn current_coordinate(&self) -> Option<Coordinate>;

    fn authorization_state(&self) -> AuthorizationState;

    /// Ask the user for location access.
    fn request_permission(&self);

    /// Ask the platform to produce a (new) fix.
    fn request_location_update(&self);

    /// Bias region of `radius_m` around the current fix, or `fallback` without one.
    fn current_region(&self, fallback: BiasRegion, radius_m: f64) -> BiasRegion {
        self.current_coordinate()
            .map_or(fallback, |center| BiasRegion::new(center, radius_m))
    }
}

/// How a [`ManualLocationProvider`] answers a permission prompt while
/// authorization is still undetermined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermissionPrompt {
    Grant,
    Deny,
    /// Leave the state undetermined (the user dismissed the prompt).
    #[default]
    Pending,
}

#[derive(Debug, Default)]
struct ManualState {
    authorization: AuthorizationState,
    coordinate: Option<Coordinate>,
    prompt: PermissionPrompt,
    staged_fix: Option<(Coordinate, Duration)>,
    /// Bumped whenever authorization is lost, so delayed deliveries started
    /// before that point are dropped.
    epoch: u64,
}

/// A location provider whose state is pushed in from outside.
///
/// Cloning shares the underlying state, so one clone can be handed to the
/// engine while another is driven by platform callbacks or a test.
///
/// ```
/// use placeseek_providers::{AuthorizationState, Coordinate, LocationProvider, ManualLocationProvider};
///
/// let location = ManualLocationProvider::new();
/// assert_eq!(location.authorization_state(), AuthorizationState::NotDetermined);
///
/// location.set_authorization(AuthorizationState::Authorized);
/// assert!(location.set_coordinate(Some(Coordinate::new(25.0330, 121.5654))));
/// assert!(location.current_coordinate().is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ManualLocationProvider {
    state: Arc<Mutex<ManualState>>,
    permission_requests: Arc<AtomicUsize>,
    location_requests: Arc<AtomicUsize>,
}

impl ManualLocationProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Authorized, with `coordinate` already cached.
    pub fn authorized_at(coordinate: Coordinate) -> Self {
        let provider = Self::new();
        {
            let mut state = provider.lock();
            state.authorization = AuthorizationState::Authorized;
            state.coordinate = Some(coordinate);
        }
        provider
    }

    /// Authorized, but no fix has been obtained yet.
    pub fn authorized_without_fix() -> Self {
        let provider = Self::new();
        provider.lock().authorization = AuthorizationState::Authorized;
        provider
    }

    /// Denied by the user.
    pub fn denied() -> Self {
        let provider = Self::new();
        provider.lock().authorization = AuthorizationState::Denied;
        provider
    }

    /// Set how the next permission prompt is answered.
    #[must_use]
    pub fn with_prompt(self, prompt: PermissionPrompt) -> Self {
        self.lock().prompt = prompt;
        self
    }

    /// Update the authorization state.
    ///
    /// Losing authorization drops the cached fix. Becoming authorized without a
    /// fix immediately requests one.
    pub fn set_authorization(&self, authorization: AuthorizationState) {
        let needs_fix = {
            let mut state = self.lock();
            if state.authorization == authorization {
                return;
            }
            info!(from = %state.authorization, to = %authorization, "Location authorization changed");
            state.authorization = authorization;
            if !authorization.is_authorized() {
                state.coordinate = None;
                state.epoch += 1;
            }
            authorization.is_authorized() && state.coordinate.is_none()
        };

        if needs_fix {
            self.request_location_update();
        }
    }

    /// Push a fix (or clear it). Fixes are only accepted while authorized.
    pub fn set_coordinate(&self, coordinate: Option<Coordinate>) -> bool {
        let mut state = self.lock();
        if coordinate.is_some() && !state.authorization.is_authorized() {
            debug!("Ignoring location fix while unauthorized");
            return false;
        }
        state.coordinate = coordinate;
        true
    }

    /// Stage a fix to be delivered `delay` after the next location request.
    pub fn stage_fix(&self, coordinate: Coordinate, delay: Duration) {
        self.lock().staged_fix = Some((coordinate, delay));
    }

    /// Number of `request_permission` calls so far.
    pub fn permission_requests(&self) -> usize {
        self.permission_requests.load(Ordering::Acquire)
    }

    /// Number of `request_location_update` calls so far.
    pub fn location_requests(&self) -> usize {
        self.location_requests.load(Ordering::Acquire)
    }

    fn lock(&self) -> MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn deliver_staged(&self, coordinate: Coordinate, delay: Duration, epoch: u64) {
        let runtime = tokio::runtime::Handle::try_current();
        match runtime {
            Ok(runtime) if !delay.is_zero() => {
                let provider = self.clone();
                runtime.spawn(async move {
                    tokio::time::sleep(delay).await;
                    let mut state = provider.lock();
                    if state.epoch == epoch && state.authorization.is_authorized() {
                        debug!(%coordinate, "Delivering staged location fix");
                        state.coordinate = Some(coordinate);
                    }
                });
            }
            _ => {
                self.lock().coordinate = Some(coordinate);
            }
        }
    }
}

impl LocationProvider for ManualLocationProvider {
    fn current_coordinate(&self) -> Option<Coordinate> {
        self.lock().coordinate
    }

    fn authorization_state(&self) -> AuthorizationState {
        self.lock().authorization
    }

    fn request_permission(&self) {
        self.permission_requests.fetch_add(1, Ordering::AcqRel);

        let granted = {
            let mut state = self.lock();
            match (state.authorization, state.prompt) {
                (AuthorizationState::NotDetermined, PermissionPrompt::Grant) => {
                    info!("Location permission granted");
                    state.authorization = AuthorizationState::Authorized;
                    state.coordinate.is_none()
                }
                (AuthorizationState::NotDetermined, PermissionPrompt::Deny) => {
                    info!("Location permission denied");
                    state.authorization = AuthorizationState::Denied;
                    false
                }
                (AuthorizationState::NotDetermined, PermissionPrompt::Pending) => {
                    info!("Location permission prompt left unanswered");
                    false
                }
                (AuthorizationState::Denied | AuthorizationState::Restricted, _) => {
                    info!("Location permission blocked, must be changed in settings");
                    false
                }
                (AuthorizationState::Authorized, _) => false,
            }
        };

        if granted {
            self.request_location_update();
        }
    }

    fn request_location_update(&self) {
        self.location_requests.fetch_add(1, Ordering::AcqRel);

        let staged = {
            let mut state = self.lock();
            if !state.authorization.is_authorized() {
                None
            } else {
                let epoch = state.epoch;
                Some(state.staged_fix.take().map(|fix| (fix, epoch)))
            }
        };

        match staged {
            None => {
                debug!("Location update requested without authorization");
                self.request_permission();
            }
            Some(Some(((coordinate, delay), epoch))) => {
                self.deliver_staged(coordinate, delay, epoch);
            }
            Some(None) => debug!("Location update requested, no fix staged"),
        }
    }
}
