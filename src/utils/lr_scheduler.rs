//! Learning rate scheduler trait and the warmup-cosine schedule
//!
//! Schedulers here are driven by optimizer steps, not epochs: the training loop
//! calls `step()` once after every parameter update.

use std::f32::consts::PI;

/// Core trait for learning rate schedulers.
///
/// # Example
///
/// ```ignore
/// let mut scheduler = WarmupCosine::new(1e-4, 0.5, total_steps);
///
/// for batch in batches {
///     optimizer.set_learning_rate(scheduler.get_lr());
///     // ... forward, backward, optimizer step ...
///     scheduler.step();
/// }
/// ```
pub trait LRScheduler {
    /// Get the learning rate for the current optimizer step.
    fn get_lr(&self) -> f32;

    /// Advance the scheduler by one optimizer step.
    fn step(&mut self);

    /// Reset the scheduler to step 0.
    fn reset(&mut self);
}

/// Linear warmup followed by cosine decay.
///
/// The multiplier rises linearly from 0 to 1 over `warmup_steps = ceil(warmup * total_steps)`
/// steps, then follows `0.5 * (1 + cos(pi * progress))` down to 0 at `total_steps`.
/// Past `total_steps` the multiplier stays at 0.
///
/// ```
/// use causal_relation_networks::utils::lr_scheduler::WarmupCosine;
///
/// let schedule = WarmupCosine::new(1.0, 0.5, 10);
/// assert_eq!(schedule.multiplier(0), 0.0);
/// assert!((schedule.multiplier(5) - 1.0).abs() < 1e-6);
/// assert!(schedule.multiplier(10).abs() < 1e-6);
/// ```
#[derive(Debug, Clone)]
pub struct WarmupCosine {
    base_lr: f32,
    warmup_steps: usize,
    total_steps: usize,
    current_step: usize,
}

impl WarmupCosine {
    /// Creates a schedule over `total_steps` optimizer steps.
    ///
    /// # Panics
    ///
    /// Panics if `warmup` is outside `[0.0, 1.0)`.
    pub fn new(base_lr: f32, warmup: f32, total_steps: usize) -> Self {
        assert!(
            (0.0..1.0).contains(&warmup),
            "warmup must be in range [0.0, 1.0)"
        );
        let warmup_steps = (warmup * total_steps as f32).ceil() as usize;
        Self {
            base_lr,
            warmup_steps,
            total_steps,
            current_step: 0,
        }
    }

    /// Number of warmup steps.
    pub fn warmup_steps(&self) -> usize {
        self.warmup_steps
    }

    /// Total number of scheduled steps.
    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    /// Current optimizer step.
    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Multiplier applied to the base learning rate at `step`.
    pub fn multiplier(&self, step: usize) -> f32 {
        if step < self.warmup_steps {
            return step as f32 / self.warmup_steps as f32;
        }
        let decay_steps = self.total_steps.saturating_sub(self.warmup_steps).max(1);
        let progress = (step - self.warmup_steps) as f32 / decay_steps as f32;
        if progress >= 1.0 {
            return 0.0;
        }
        (0.5 * (1.0 + (PI * progress).cos())).max(0.0)
    }
}

impl LRScheduler for WarmupCosine {
    fn get_lr(&self) -> f32 {
        self.base_lr * self.multiplier(self.current_step)
    }

    fn step(&mut self) {
        self.current_step += 1;
    }

    fn reset(&mut self) {
        self.current_step = 0;
    }
}

/// Total optimizer steps for a run: `epochs * ceil(n_train / batch_size)`.
pub fn total_steps(epochs: usize, n_train: usize, batch_size: usize) -> usize {
    epochs * n_train.div_ceil(batch_size.max(1))
}
