//! Synthetic agent workloads for the simulator.

use anyhow::{Context, Result};
use tracing::{debug, warn};

use framebal::presets::{AI, DEFAULT, NAVIGATION, STEERING};
use framebal::{Balancer, BalancerRegistry, Continuation, ScheduleOptions, TickContext, Work};

/// Cheap sensor sweep, every frame-ish.
pub struct SteeringScan {
    agent: usize,
}

impl Work for SteeringScan {
    fn name(&self) -> &str {
        "steering-scan"
    }

    fn run(&mut self, ctx: &TickContext) -> Continuation {
        // pretend every seventh sweep sees something
        if (self.agent as u64 + ctx.run_count) % 7 == 0 {
            debug!(agent = self.agent, now = ctx.now, "Steering contact");
        }
        Continuation::Continue
    }
}

/// Polls a moving obstacle; polls faster while it moves.
pub struct ObstaclePoll {
    obstacle: usize,
    last_position: (f64, f64),
    base_interval: f64,
}

impl ObstaclePoll {
    fn position_at(&self, now: f64) -> (f64, f64) {
        let phase = self.obstacle as f64;
        // obstacles stand still for half of every 4s cycle
        let t = (now + phase) % 4.0;
        if t < 2.0 {
            (phase + t, phase)
        } else {
            (phase + 2.0, phase)
        }
    }
}

impl Work for ObstaclePoll {
    fn name(&self) -> &str {
        "obstacle-poll"
    }

    fn run(&mut self, ctx: &TickContext) -> Continuation {
        let position = self.position_at(ctx.now);
        let moved = position != self.last_position;
        self.last_position = position;
        if moved {
            Continuation::ContinueAfter(self.base_interval / 2.0)
        } else {
            Continuation::Continue
        }
    }
}

/// Expensive decision step.
pub struct AiTick {
    agent: usize,
}

impl Work for AiTick {
    fn name(&self) -> &str {
        "ai-tick"
    }

    fn run(&mut self, ctx: &TickContext) -> Continuation {
        let mut score = self.agent as u64;
        for i in 0..2_000u64 {
            score = score.wrapping_mul(6364136223846793005).wrapping_add(i);
        }
        if score % 1_000 == 0 {
            debug!(agent = self.agent, tick = ctx.tick, "Agent changed plan");
        }
        Continuation::Continue
    }
}

/// Waits for a target to come into range, then retires.
pub struct TargetPoll {
    agent: usize,
    arrives_after: u64,
}

impl Work for TargetPoll {
    fn name(&self) -> &str {
        "target-poll"
    }

    fn run(&mut self, ctx: &TickContext) -> Continuation {
        if ctx.run_count >= self.arrives_after {
            debug!(agent = self.agent, now = ctx.now, "Target reached");
            Continuation::Retire
        } else {
            Continuation::Continue
        }
    }
}

fn balancer<'a>(registry: &'a BalancerRegistry, name: &str) -> Result<&'a Balancer> {
    registry
        .get(name)
        .with_context(|| format!("config has no '{name}' balancer"))
}

/// Schedule every synthetic workload for `agents` agents.
///
/// Items that hit a balancer's capacity are logged and dropped.
pub fn populate(registry: &BalancerRegistry, agents: usize) -> Result<usize> {
    let steering = balancer(registry, STEERING)?;
    let navigation = balancer(registry, NAVIGATION)?;
    let ai = balancer(registry, AI)?;
    let default = balancer(registry, DEFAULT)?;

    let mut admitted = 0;
    let mut admit = |result: Result<framebal::Handle, framebal::BalancerError>| match result {
        Ok(_) => admitted += 1,
        Err(e) => warn!(error = %e, "Workload not admitted"),
    };

    for agent in 0..agents {
        let stagger = (agent % 10) as f64 * 0.01;
        admit(steering.schedule_work(
            SteeringScan { agent },
            ScheduleOptions::every(0.05).with_initial_delay(stagger),
        ));
        admit(navigation.schedule_work(
            ObstaclePoll {
                obstacle: agent,
                last_position: (0.0, 0.0),
                base_interval: 0.25,
            },
            ScheduleOptions::every(0.25).with_initial_delay(stagger),
        ));
        admit(ai.schedule_work(
            AiTick { agent },
            ScheduleOptions::every(0.5).with_initial_delay(stagger),
        ));
        admit(default.schedule_work(
            TargetPoll {
                agent,
                arrives_after: 5 + (agent % 20) as u64,
            },
            ScheduleOptions::every(0.2).named("target-poll"),
        ));
        admit(default.execute_once(
            move |ctx: &TickContext| debug!(agent, now = ctx.now, "Deferred spawn effect"),
            0.5 + stagger,
        ));
    }
    Ok(admitted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn populate_fills_every_preset() {
        let registry = BalancerRegistry::with_presets().unwrap();
        let admitted = populate(&registry, 4).unwrap();
        assert_eq!(admitted, 20);
        assert_eq!(registry.get(STEERING).unwrap().len(), 4);
        assert_eq!(registry.get(DEFAULT).unwrap().len(), 8);
    }

    #[test]
    fn populate_needs_preset_names() {
        let mut registry = BalancerRegistry::new();
        registry
            .register("only", framebal::BalancerConfig::default())
            .unwrap();
        assert!(populate(&registry, 1).is_err());
    }

    #[test]
    fn target_poll_retires() {
        let registry = BalancerRegistry::with_presets().unwrap();
        let default = registry.default_balancer().unwrap();
        let handle = default
            .schedule_work(
                TargetPoll { agent: 0, arrives_after: 2 },
                ScheduleOptions::every(0.0),
            )
            .unwrap();
        for frame in 0..3 {
            default.tick(frame as f64);
        }
        assert!(!handle.is_active());
        assert!(default.is_empty());
    }

    #[test]
    fn obstacle_poll_speeds_up_while_moving() {
        let mut poll = ObstaclePoll {
            obstacle: 0,
            last_position: (0.0, 0.0),
            base_interval: 0.25,
        };
        let ctx = |now| TickContext {
            item: framebal::ItemId(1),
            now,
            delta_time: 0.25,
            interval: 0.25,
            tick: 1,
            run_count: 0,
        };
        assert_eq!(poll.run(&ctx(1.0)), Continuation::ContinueAfter(0.125));
        assert_eq!(poll.run(&ctx(2.5)), Continuation::ContinueAfter(0.125));
        assert_eq!(poll.run(&ctx(3.0)), Continuation::Continue);
    }
}
