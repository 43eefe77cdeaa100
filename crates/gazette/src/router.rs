use crate::Error;
use broker::process_spec::Id as MemberId;
use proto_gazette::broker;
use std::collections::HashMap;
use std::sync::Arc;
use tonic::transport::Channel;

// DialState represents a Channel which may be:
// - Ready (if Some)
// - Currently being dialed (if locked)
// - Neither (None and not locked).
// Ready channels also track their number of uses since the last sweep.
type DialState = Arc<futures::lock::Mutex<Option<(Channel, usize)>>>;

/// Router dispatches requests to designated members of a dynamic serving
/// topology, maintaining ready Channels to member endpoints which may be
/// discovered over time as journals and shards move between processes.
#[derive(Clone)]
pub struct Router {
    inner: Arc<Inner>,
}

struct Inner {
    states: std::sync::Mutex<HashMap<MemberId, DialState>>,
    zone: String,
}

impl Router {
    /// Create a new Router which prefers to route to members in `zone`.
    pub fn new(zone: &str) -> Self {
        Self {
            inner: Arc::new(Inner {
                states: Default::default(),
                zone: zone.to_string(),
            }),
        }
    }

    /// Map an optional broker::Route and a `primary` requirement into a
    /// ready Channel for dispatch of an RPC, preferring an already-ready
    /// member Channel and dialing a new one only if required.
    pub async fn route(
        &self,
        route: Option<&broker::Route>,
        primary: bool,
        default: &MemberId,
    ) -> Result<Channel, Error> {
        let (index, state) = self.pick(route, primary, default);

        // Acquire a MemberId-specific, async-aware lock.
        let mut state = state.lock().await;

        // Fast path: client is dialed and ready.
        if let Some((ref client, uses)) = &mut *state {
            *uses += 1;
            return Ok(client.clone());
        }

        // Slow path: dial the endpoint.
        let channel = crate::dial_channel(match index {
            Some(index) => &route.unwrap().endpoints[index],
            None => &default.suffix,
        })
        .await?;

        *state = Some((channel.clone(), 1));

        Ok(channel)
    }

    fn pick(&self, route: Option<&broker::Route>, primary: bool, default: &MemberId) -> (Option<usize>, DialState) {
        // Acquire the non-async lock, which must not be held across an await.
        let mut states = self.inner.states.lock().unwrap();
        let index = pick(route, primary, &self.inner.zone, &states);

        let id = match index {
            Some(index) => &route.unwrap().members[index],
            None => default,
        };

        let state = match states.get(id) {
            Some(value) => value.clone(),
            None => states.entry(id.clone()).or_default().clone(),
        };

        (index, state)
    }

    /// Close Channels which have not been used since the preceding sweep.
    /// As members come and go, their Channels accumulate; call sweep()
    /// periodically (the idle-sweep task) to clear them out.
    pub fn sweep(&self) {
        let mut states = self.inner.states.lock().unwrap();

        states.retain(|id, state| {
            // Retain entries which are currently being dialed.
            let Some(mut state) = state.try_lock() else {
                return true;
            };
            // Drop entries which never connected.
            let Some((_client, uses)) = &mut *state else {
                return false;
            };
            // Drop entries unused since the last sweep.
            if *uses == 0 {
                tracing::debug!(?id, "dropping idle member connection");
                return false;
            }
            *uses = 0; // Mark for the next sweep.
            true
        });
    }
}

fn pick(route: Option<&broker::Route>, primary: bool, zone: &str, states: &HashMap<MemberId, DialState>) -> Option<usize> {
    let default_route = broker::Route::default();
    let route = route.unwrap_or(&default_route);

    route
        .members
        .iter()
        .zip(route.endpoints.iter())
        .enumerate()
        .max_by_key(|(index, (id, _endpoint))| {
            let connected = if let Some(state) = states.get(id) {
                if let Some(state) = state.try_lock() {
                    state.as_ref().is_some() // Transport is ready.
                } else {
                    true // Another task is dialing this transport.
                }
            } else {
                false // Transport has not been started.
            };

            (
                // Prefer the primary, if one is required.
                primary && *index as i32 == route.primary,
                // Prefer members in our own zone.
                zone == id.zone,
                // Prefer members which are already connected.
                connected,
            )
        })
        .map(|(index, _)| index)
}

/// Periodically sweep a Router's idle connections until `router` is the
/// last remaining reference.
pub async fn idle_sweep(router: std::sync::Weak<Router>, period: std::time::Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        let Some(router) = router.upgrade() else {
            return;
        };
        router.sweep();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(zone: &str, suffix: &str) -> MemberId {
        MemberId {
            zone: zone.to_string(),
            suffix: suffix.to_string(),
        }
    }

    #[test]
    fn test_pick_prefers_zone_then_connected() {
        let states: HashMap<MemberId, DialState> = HashMap::from([(member("east", "b"), Default::default())]);

        let route = broker::Route {
            primary: -1,
            members: vec![member("west", "a"), member("east", "b")],
            endpoints: vec!["a:1".to_string(), "b:1".to_string()],
        };

        assert_eq!(pick(Some(&route), false, "east", &states), Some(1));
    }

    #[test]
    fn test_pick_none_route_falls_back_to_default() {
        let states = HashMap::new();
        assert_eq!(pick(None, false, "east", &states), None);
    }
}
