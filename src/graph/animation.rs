//! Spring-based animation for smooth camera transitions.
//!
//! Critically damped spring physics; values converge without overshoot.
//! No callbacks: call `tick(dt)` at the start of the frame, then read with
//! `get()`.

/// Spring parameters.
#[derive(Debug, Clone, Copy)]
pub struct SpringConfig {
    /// Stiffness (higher = faster response). Typical: 80-300
    pub stiffness: f32,
    /// Damping ratio: 1.0 = critically damped (no overshoot)
    pub damping: f32,
}

impl Default for SpringConfig {
    fn default() -> Self {
        Self::from_preset("medium")
    }
}

impl SpringConfig {
    /// Preset by name. Unknown names fall back to `medium`.
    ///
    /// - `fast`: snappy UI response, quick zooms
    /// - `medium`: camera moves, node transitions
    /// - `slow`: cinematic drill-down transitions
    pub fn from_preset(name: &str) -> Self {
        match name {
            "fast" => Self {
                stiffness: 300.0,
                damping: 1.0,
            },
            "slow" => Self {
                stiffness: 80.0,
                damping: 1.0,
            },
            _ => Self {
                stiffness: 170.0,
                damping: 1.0,
            },
        }
    }
}

// =============================================================================
// SPRING F32
// =============================================================================

/// Animated f32 value with spring physics.
#[derive(Debug, Clone)]
pub struct SpringF32 {
    current: f32,
    target: f32,
    velocity: f32,
    config: SpringConfig,
}

impl SpringF32 {
    pub fn new(initial: f32) -> Self {
        Self::with_config(initial, SpringConfig::default())
    }

    pub fn with_config(initial: f32, config: SpringConfig) -> Self {
        Self {
            current: initial,
            target: initial,
            velocity: 0.0,
            config,
        }
    }

    /// Set new target value (animation begins)
    pub fn set_target(&mut self, target: f32) {
        self.target = target;
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    /// Jump immediately to value (no animation)
    pub fn set_immediate(&mut self, value: f32) {
        self.current = value;
        self.target = value;
        self.velocity = 0.0;
    }

    /// Update animation state (call each frame with delta time in seconds).
    ///
    /// F = -k*x - c*v, where k = stiffness, c = damping * 2 * sqrt(k)
    pub fn tick(&mut self, dt: f32) {
        // Clamp dt to prevent instability with large time steps
        let dt = dt.min(0.1);

        let displacement = self.current - self.target;
        let spring_force = -self.config.stiffness * displacement;
        let damping_force =
            -self.config.damping * 2.0 * self.config.stiffness.sqrt() * self.velocity;
        let acceleration = spring_force + damping_force;

        self.velocity += acceleration * dt;
        self.current += self.velocity * dt;

        // Snap to target if close enough (prevents micro-oscillation)
        if (self.current - self.target).abs() < 0.0001 && self.velocity.abs() < 0.001 {
            self.current = self.target;
            self.velocity = 0.0;
        }
    }

    pub fn get(&self) -> f32 {
        self.current
    }

    pub fn is_animating(&self) -> bool {
        (self.current - self.target).abs() > 0.0001 || self.velocity.abs() > 0.001
    }

    pub fn set_config(&mut self, config: SpringConfig) {
        self.config = config;
    }
}

// =============================================================================
// SPRING VEC2
// =============================================================================

/// Animated 2D vector with spring physics (for positions, offsets)
#[derive(Debug, Clone)]
pub struct SpringVec2 {
    pub x: SpringF32,
    pub y: SpringF32,
}

impl SpringVec2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x: SpringF32::new(x),
            y: SpringF32::new(y),
        }
    }

    pub fn with_config(x: f32, y: f32, config: SpringConfig) -> Self {
        Self {
            x: SpringF32::with_config(x, config),
            y: SpringF32::with_config(y, config),
        }
    }

    pub fn set_target(&mut self, x: f32, y: f32) {
        self.x.set_target(x);
        self.y.set_target(y);
    }

    pub fn target(&self) -> (f32, f32) {
        (self.x.target(), self.y.target())
    }

    pub fn set_immediate(&mut self, x: f32, y: f32) {
        self.x.set_immediate(x);
        self.y.set_immediate(y);
    }

    pub fn tick(&mut self, dt: f32) {
        self.x.tick(dt);
        self.y.tick(dt);
    }

    pub fn get(&self) -> (f32, f32) {
        (self.x.get(), self.y.get())
    }

    pub fn get_pos2(&self) -> egui::Pos2 {
        egui::Pos2::new(self.x.get(), self.y.get())
    }

    pub fn is_animating(&self) -> bool {
        self.x.is_animating() || self.y.is_animating()
    }

    pub fn set_config(&mut self, config: SpringConfig) {
        self.x.set_config(config);
        self.y.set_config(config);
    }
}

// =============================================================================
// TESTS
// =============================================================================
