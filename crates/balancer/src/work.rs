use crate::types::{Continuation, ItemId};

/// Context handed to a work item each time it runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickContext {
    /// The item being run.
    pub item: ItemId,
    /// Time of the current tick in seconds.
    pub now: f64,
    /// Seconds since the item last ran (or since it was scheduled, on the first run).
    pub delta_time: f64,
    /// The item's configured interval.
    pub interval: f64,
    /// Tick counter of the owning balancer.
    pub tick: u64,
    /// Number of earlier executions of this item.
    pub run_count: u64,
}

/// A unit of recurring or one-shot work the balancer can execute.
///
/// Implementations own whatever per-item state they need and must return
/// promptly: no blocking I/O, no waiting on locks.
pub trait Work: Send {
    /// Human-readable name for logging and metrics.
    fn name(&self) -> &str {
        "work"
    }

    /// Run one step of the work.
    fn run(&mut self, ctx: &TickContext) -> Continuation;
}

impl Work for Box<dyn Work> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn run(&mut self, ctx: &TickContext) -> Continuation {
        (**self).run(ctx)
    }
}

/// Adapts a closure into [`Work`].
pub struct FnWork<F> {
    name: String,
    f: F,
}

impl<F> FnWork<F>
where
    F: FnMut(&TickContext) -> Continuation + Send,
{
    pub fn new(f: F) -> Self {
        Self::named("fn", f)
    }

    pub fn named(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> Work for FnWork<F>
where
    F: FnMut(&TickContext) -> Continuation + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&mut self, ctx: &TickContext) -> Continuation {
        (self.f)(ctx)
    }
}

/// Work driven by an explicit state value passed to the step function by `&mut`.
///
/// The state stays inspectable, so a step function can be tested without a balancer.
pub struct StatefulWork<S, F> {
    name: String,
    state: S,
    step: F,
}

impl<S, F> StatefulWork<S, F>
where
    S: Send,
    F: FnMut(&mut S, &TickContext) -> Continuation + Send,
{
    pub fn new(name: impl Into<String>, state: S, step: F) -> Self {
        Self {
            name: name.into(),
            state,
            step,
        }
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn into_state(self) -> S {
        self.state
    }
}

impl<S, F> Work for StatefulWork<S, F>
where
    S: Send,
    F: FnMut(&mut S, &TickContext) -> Continuation + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&mut self, ctx: &TickContext) -> Continuation {
        (self.step)(&mut self.state, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(now: f64) -> TickContext {
        TickContext {
            item: ItemId(1),
            now,
            delta_time: 0.0,
            interval: 0.0,
            tick: 1,
            run_count: 0,
        }
    }

    #[test]
    fn fn_work_calls_closure() {
        let mut calls = 0;
        {
            let mut work = FnWork::named("probe", |_: &TickContext| {
                calls += 1;
                Continuation::Continue
            });
            assert_eq!(work.name(), "probe");
            assert_eq!(work.run(&ctx(0.0)), Continuation::Continue);
            assert_eq!(work.run(&ctx(1.0)), Continuation::Continue);
        }
        assert_eq!(calls, 2);
    }

    #[derive(Debug, Default)]
    struct Poll {
        last_seen: f64,
        attempts: u32,
    }

    #[test]
    fn stateful_work_mutates_owned_state() {
        let mut work = StatefulWork::new("poll", Poll::default(), |s: &mut Poll, ctx: &TickContext| {
            s.attempts += 1;
            s.last_seen = ctx.now;
            Continuation::from(s.attempts < 3)
        });

        assert_eq!(work.run(&ctx(0.5)), Continuation::Continue);
        assert_eq!(work.run(&ctx(1.5)), Continuation::Continue);
        assert_eq!(work.run(&ctx(2.5)), Continuation::Retire);
        assert_eq!(work.state().attempts, 3);
        assert_eq!(work.into_state().last_seen, 2.5);
    }

    #[test]
    fn boxed_work_delegates() {
        let mut boxed: Box<dyn Work> = Box::new(FnWork::named("boxed", |_: &TickContext| Continuation::Retire));
        assert_eq!(Work::name(&boxed), "boxed");
        assert_eq!(Work::run(&mut boxed, &ctx(0.0)), Continuation::Retire);
    }
}
