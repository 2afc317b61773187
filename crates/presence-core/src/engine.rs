//! Session scheduler

use chrono::{DateTime, Local};
use presence_config::Policy;
use presence_gateway_api::{Connection, Gateway, GatewayError, GatewayResult};
use presence_util::{MemberId, format_duration};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::future::Future;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, trace, warn};

use crate::{
    Clock, CoreEvent, DailyResetController, OccupancyMonitor, OccupancySignal, Session,
    SessionEndReason, SessionState, SkipReason, TimerFired, TimerKind, TimerService,
};

/// Failures inside one scheduler cycle
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Timer channel closed")]
    TimerChannelClosed,
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Everything the scheduler mutates, owned by the event loop
pub struct SchedulerState {
    state: SessionState,
    session: Option<Session>,
    timers: TimerService,
    monitor: OccupancyMonitor,
    rng: StdRng,
}

impl SchedulerState {
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn timers(&self) -> &TimerService {
        &self.timers
    }
}

/// The session scheduler
///
/// Owns the single live session and drives the gateway. Each public
/// transition method runs to completion and returns the events it produced;
/// [`Scheduler::run`] feeds them timer firings and arrival signals one at a
/// time.
pub struct Scheduler {
    policy: Policy,
    gateway: Arc<dyn Gateway>,
    clock: Arc<dyn Clock>,
    reset: DailyResetController,
    state: SchedulerState,
    timer_rx: mpsc::UnboundedReceiver<TimerFired>,
    event_sink: Option<mpsc::UnboundedSender<CoreEvent>>,
}

impl Scheduler {
    /// Create a scheduler. Must be called from within a tokio runtime
    /// before any transition is driven.
    pub fn new(policy: Policy, gateway: Arc<dyn Gateway>, clock: Arc<dyn Clock>) -> Self {
        let (timers, timer_rx) = TimerService::channel();
        let monitor = OccupancyMonitor::new(gateway.clone(), policy.target.channel_id.clone());
        let reset = DailyResetController::new(policy.window);

        info!(
            guild_id = %policy.target.guild_id,
            channel_id = %policy.target.channel_id,
            window = %policy.window,
            "Scheduler initialized"
        );

        Self {
            policy,
            gateway,
            clock,
            reset,
            state: SchedulerState {
                state: SessionState::Idle,
                session: None,
                timers,
                monitor,
                rng: StdRng::from_entropy(),
            },
            timer_rx,
            event_sink: None,
        }
    }

    /// Replace the random source (tests seed it for reproducible sampling)
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.state.rng = rng;
        self
    }

    /// Forward every emitted event to `sink` while [`Scheduler::run`] is active
    pub fn with_event_sink(mut self, sink: mpsc::UnboundedSender<CoreEvent>) -> Self {
        self.event_sink = Some(sink);
        self
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    pub fn session_state(&self) -> SessionState {
        self.state.state
    }

    fn set_state(&mut self, to: SessionState, events: &mut Vec<CoreEvent>) {
        let from = self.state.state;
        if from == to {
            return;
        }
        debug!(%from, %to, "State transition");
        self.state.state = to;
        events.push(CoreEvent::StateChanged { from, to });
    }

    fn sample_minutes(&mut self, range: RangeInclusive<u32>) -> u32 {
        self.state.rng.gen_range(range)
    }

    fn arm_next_session_at(
        &mut self,
        now: DateTime<Local>,
        at: DateTime<Local>,
        events: &mut Vec<CoreEvent>,
    ) {
        let delay = presence_util::duration_until(&now, &at);
        self.state.timers.arm(TimerKind::NextSession, &now, at);
        info!(at = %at, delay = %format_duration(delay), "Next session attempt scheduled");
        events.push(CoreEvent::NextSessionScheduled { at, delay });
    }

    fn schedule_after_random_delay(&mut self, now: DateTime<Local>, events: &mut Vec<CoreEvent>) {
        let minutes = self.sample_minutes(self.policy.session.delay_range());
        debug!(delay_minutes = minutes, "Sampled inter-session delay");
        let at = now + chrono::Duration::minutes(i64::from(minutes));
        self.arm_next_session_at(now, at, events);
    }

    /// Arm the daily reset and the first session attempt
    ///
    /// Inside the window the first attempt follows a normal randomized
    /// delay; outside it the attempt is anchored to the next window start.
    pub fn start(&mut self) -> Vec<CoreEvent> {
        let now = self.clock.now();
        let mut events = Vec::new();

        let reset_at = self.reset.next_fire(&now);
        self.state.timers.arm(TimerKind::DailyReset, &now, reset_at);
        info!(next_reset = %reset_at, "Daily reset armed");

        if self.policy.window.is_active(&now) {
            self.schedule_after_random_delay(now, &mut events);
        } else {
            info!(window = %self.policy.window, "Outside active window, waiting for window start");
            let at = self.policy.window.next_start_after(&now);
            self.arm_next_session_at(now, at, &mut events);
        }

        events
    }

    /// Next-session timer fired: try to occupy the channel
    pub async fn attempt_session(&mut self) -> Vec<CoreEvent> {
        let mut events = Vec::new();

        if self.state.state.has_session() {
            warn!(state = %self.state.state, "Session attempt while a session exists, ignoring");
            return events;
        }

        let now = self.clock.now();

        if !self.policy.window.is_active(&now) {
            info!(window = %self.policy.window, "Outside active window, not starting a session");
            events.push(CoreEvent::AttemptSkipped {
                reason: SkipReason::OutsideWindow,
            });
            // One anchored attempt at the window start, never a retry loop
            let at = self.policy.window.next_start_after(&now);
            self.arm_next_session_at(now, at, &mut events);
            return events;
        }

        match self.state.monitor.has_other_members().await {
            Ok(false) => {}
            Ok(true) => {
                info!("Channel already has members, skipping this session");
                events.push(CoreEvent::AttemptSkipped {
                    reason: SkipReason::ChannelOccupied,
                });
                self.schedule_after_random_delay(now, &mut events);
                return events;
            }
            Err(e) => {
                error!(error = %e, "Failed to list channel members");
                events.push(CoreEvent::AttemptSkipped {
                    reason: SkipReason::MemberListFailed {
                        error: e.to_string(),
                    },
                });
                self.schedule_after_random_delay(now, &mut events);
                return events;
            }
        }

        let session = Session::connecting(self.policy.target.channel_id.clone(), now);
        let session_id = session.session_id.clone();
        self.state.session = Some(session);
        self.state.timers.cancel(TimerKind::NextSession);
        self.state.monitor.attach();
        self.set_state(SessionState::Connecting, &mut events);

        info!(
            %session_id,
            channel_id = %self.policy.target.channel_id,
            "Connecting to voice channel"
        );

        match self.connect().await {
            Ok(connection) => {
                self.activate(connection, &mut events);

                // Someone who joined while the handshake was in flight still wins
                self.state.monitor.drain();
                if let Some(signal) = self.state.monitor.take_signal() {
                    info!(%session_id, ?signal, "Occupancy changed while connecting, leaving");
                    self.vacate(signal_end_reason(&signal), &mut events).await;
                } else {
                    self.recheck_occupancy(&mut events).await;
                }
            }
            Err(e) => {
                error!(%session_id, error = %e, "Failed to connect to voice channel");
                events.push(CoreEvent::ConnectFailed {
                    session_id,
                    error: e.to_string(),
                });
                self.vacate(SessionEndReason::ConnectFailed, &mut events).await;
            }
        }

        events
    }

    /// Catch a member who joined after the pre-connect check but before the
    /// feed was subscribed. Such a join produces no event on the feed.
    async fn recheck_occupancy(&mut self, events: &mut Vec<CoreEvent>) {
        match self.state.monitor.has_other_members().await {
            Ok(false) => {}
            Ok(true) => {
                info!("Channel filled while connecting, leaving");
                self.vacate(SessionEndReason::MemberJoined, events).await;
            }
            Err(e) => {
                // Later arrivals still reach us through the feed
                warn!(error = %e, "Failed to recheck channel members after connecting");
            }
        }
    }

    async fn connect(&self) -> SchedulerResult<Connection> {
        let target = &self.policy.target;
        bounded(
            self.policy.daemon.connect_timeout,
            self.gateway.connect(&target.guild_id, &target.channel_id),
        )
        .await
    }

    async fn disconnect(&self, connection: &Connection) -> SchedulerResult<()> {
        bounded(
            self.policy.daemon.disconnect_timeout,
            self.gateway.disconnect(connection),
        )
        .await
    }

    fn activate(&mut self, connection: Connection, events: &mut Vec<CoreEvent>) {
        let now = self.clock.now();
        let minutes = self.sample_minutes(self.policy.session.duration_range());
        let planned_duration = Duration::from_secs(u64::from(minutes) * 60);
        let planned_end = now + chrono::Duration::minutes(i64::from(minutes));

        let Some(session) = self.state.session.as_mut() else {
            // Unreachable: attempt_session created the session
            warn!(connection = %connection.id(), "Connected without a session record");
            return;
        };
        session.activate(connection, planned_duration, now);
        let session_id = session.session_id.clone();
        let channel_id = session.channel_id.clone();

        self.state.timers.arm(TimerKind::SessionEnd, &now, planned_end);
        self.set_state(SessionState::Active, events);

        info!(
            %session_id,
            duration_minutes = minutes,
            planned_end = %planned_end,
            "Session started"
        );

        events.push(CoreEvent::SessionStarted {
            session_id,
            channel_id,
            planned_duration,
            planned_end,
        });
    }

    /// Session-end timer fired. A pending occupancy signal takes precedence
    /// and is reported as the end reason.
    pub async fn end_session(&mut self) -> Vec<CoreEvent> {
        let mut events = Vec::new();
        if self.state.state != SessionState::Active {
            debug!(state = %self.state.state, "Session end with no active session");
            return events;
        }

        self.state.monitor.drain();
        let reason = match self.state.monitor.take_signal() {
            Some(signal) => {
                info!(?signal, "Occupancy changed as the session was ending");
                signal_end_reason(&signal)
            }
            None => SessionEndReason::DurationElapsed,
        };

        self.vacate(reason, &mut events).await;
        events
    }

    /// A non-bot member joined the managed channel
    pub async fn handle_arrival(&mut self, member_id: &MemberId) -> Vec<CoreEvent> {
        let mut events = Vec::new();
        if self.state.state != SessionState::Active {
            debug!(
                %member_id,
                state = %self.state.state,
                "Arrival outside an active session ignored"
            );
            return events;
        }

        info!(%member_id, "Member joined, yielding the channel");
        self.vacate(SessionEndReason::MemberJoined, &mut events).await;
        events
    }

    /// The membership feed closed under an active session
    ///
    /// Without the feed arrivals go unnoticed, so the session is given up
    /// and the next attempt follows the usual randomized delay.
    pub async fn handle_feed_lost(&mut self) -> Vec<CoreEvent> {
        let mut events = Vec::new();
        if self.state.state != SessionState::Active {
            debug!(state = %self.state.state, "Feed loss outside an active session ignored");
            return events;
        }

        warn!("Membership feed lost, leaving the channel");
        self.vacate(SessionEndReason::FeedLost, &mut events).await;
        events
    }

    async fn handle_signal(&mut self, signal: OccupancySignal) -> Vec<CoreEvent> {
        match signal {
            OccupancySignal::Arrival(member_id) => self.handle_arrival(&member_id).await,
            OccupancySignal::FeedLost => self.handle_feed_lost().await,
        }
    }

    /// Act on any arrival or feed loss already buffered on the membership feed
    pub async fn check_arrivals(&mut self) -> Vec<CoreEvent> {
        self.state.monitor.drain();
        match self.state.monitor.take_signal() {
            Some(signal) => self.handle_signal(signal).await,
            None => Vec::new(),
        }
    }

    /// End-of-window boundary: hard stop, then anchor to tomorrow
    pub async fn daily_reset(&mut self) -> Vec<CoreEvent> {
        let mut events = Vec::new();
        let now = self.clock.now();
        let plan = self.reset.plan(&now);

        info!(
            next_start = %plan.next_start,
            next_reset = %plan.next_reset,
            "Performing daily reset"
        );

        self.vacate(SessionEndReason::DailyReset, &mut events).await;
        self.state.timers.cancel(TimerKind::SessionEnd);
        self.state.timers.cancel(TimerKind::NextSession);

        self.arm_next_session_at(now, plan.next_start, &mut events);
        self.state.timers.arm(TimerKind::DailyReset, &now, plan.next_reset);

        events.push(CoreEvent::DailyReset {
            next_start: plan.next_start,
            next_reset: plan.next_reset,
        });
        events
    }

    /// Release everything before the process exits
    pub async fn shutdown(&mut self) -> Vec<CoreEvent> {
        let mut events = Vec::new();
        self.vacate(SessionEndReason::Shutdown, &mut events).await;
        self.state.timers.cancel_all();
        info!("Scheduler stopped");
        events
    }

    /// Route a timer firing. Stale firings are dropped.
    pub async fn on_timer(&mut self, fired: TimerFired) -> Vec<CoreEvent> {
        if !self.state.timers.accept(fired) {
            return Vec::new();
        }

        trace!(kind = %fired.kind, "Timer fired");

        match fired.kind {
            TimerKind::NextSession => self.attempt_session().await,
            TimerKind::SessionEnd => self.end_session().await,
            TimerKind::DailyReset => self.daily_reset().await,
        }
    }

    /// The vacate routine shared by every path out of a session
    ///
    /// Cancels the session timers, releases the connection, detaches the
    /// monitor and returns to `Idle`, then arms the next attempt according
    /// to `reason`. Does nothing when no session exists.
    async fn vacate(&mut self, reason: SessionEndReason, events: &mut Vec<CoreEvent>) {
        let Some(mut session) = self.state.session.take() else {
            return;
        };

        self.state.timers.cancel(TimerKind::SessionEnd);
        self.state.timers.cancel(TimerKind::NextSession);

        if let Some(connection) = session.take_connection() {
            self.set_state(SessionState::Disconnecting, events);
            if let Err(e) = self.disconnect(&connection).await {
                // The connection is abandoned either way; never keep a half session
                warn!(
                    session_id = %session.session_id,
                    connection = %connection.id(),
                    error = %e,
                    "Disconnect failed"
                );
            }
        }

        self.state.monitor.detach();

        let now = self.clock.now();
        let duration = session.elapsed(now);

        info!(
            session_id = %session.session_id,
            %reason,
            duration = %format_duration(duration),
            "Session ended"
        );

        events.push(CoreEvent::SessionEnded {
            session_id: session.session_id,
            reason,
            duration,
        });

        self.set_state(SessionState::Idle, events);

        match reason {
            SessionEndReason::DurationElapsed
            | SessionEndReason::MemberJoined
            | SessionEndReason::ConnectFailed
            | SessionEndReason::FeedLost => self.schedule_after_random_delay(now, events),
            SessionEndReason::DailyReset | SessionEndReason::Shutdown => {}
        }
    }

    fn publish(&self, events: Vec<CoreEvent>) {
        for event in events {
            trace!(?event, "Core event");
            if let Some(sink) = &self.event_sink {
                let _ = sink.send(event);
            }
        }
    }

    /// Run the event loop until `shutdown` flips to `true` (or its sender
    /// is dropped), then release the session.
    ///
    /// Shutdown is checked first, then occupancy signals, then timers, so an
    /// arrival that races the session-end timer always wins.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> SchedulerResult<()> {
        enum Step {
            Occupancy(OccupancySignal),
            Timer(TimerFired),
        }

        let events = self.start();
        self.publish(events);

        info!("Scheduler running");

        let result = loop {
            if *shutdown.borrow() {
                break Ok(());
            }

            let step = tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break Ok(());
                    }
                    continue;
                }

                signal = self.state.monitor.next_signal() => Step::Occupancy(signal),

                fired = self.timer_rx.recv() => match fired {
                    Some(fired) => Step::Timer(fired),
                    None => break Err(SchedulerError::TimerChannelClosed),
                },
            };

            let events = match step {
                Step::Occupancy(signal) => self.handle_signal(signal).await,
                Step::Timer(fired) => self.on_timer(fired).await,
            };
            self.publish(events);
        };

        info!("Scheduler shutting down");
        let events = self.shutdown().await;
        self.publish(events);

        result
    }
}

fn signal_end_reason(signal: &OccupancySignal) -> SessionEndReason {
    match signal {
        OccupancySignal::Arrival(_) => SessionEndReason::MemberJoined,
        OccupancySignal::FeedLost => SessionEndReason::FeedLost,
    }
}

/// Await a gateway call with an upper bound
async fn bounded<T>(
    limit: Duration,
    op: impl Future<Output = GatewayResult<T>>,
) -> SchedulerResult<T> {
    let result = tokio::time::timeout(limit, op)
        .await
        .map_err(|_| GatewayError::Timeout(limit))?;
    Ok(result?)
}
