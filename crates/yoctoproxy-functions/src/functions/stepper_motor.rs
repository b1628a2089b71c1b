/*!
 * Stepper motor proxy.
 *
 * Motion commands are queued by the controller; the proxy forwards them and
 * tracks the controller state from the advertised value.
 */
use std::sync::Arc;

use crate::hardware::{invalid, FunctionClass, FunctionHandle, StepperMotorHardware};
use crate::proxy::{proxy_enum, sentinel, CacheValue, FunctionProxy, ProxyBase, Result};

proxy_enum! {
    /// Controller state, advertised by the device
    pub enum StepperMotorState {
        Absent = 0 => "ABSENT",
        Alert = 1 => "ALERT",
        HiZ = 2 => "HI_Z",
        Stop = 3 => "STOP",
        Run = 4 => "RUN",
        Batch = 5 => "BATCH",
    }
}

proxy_enum! {
    /// Stepping mode
    pub enum Stepping {
        Microstep16 = 0 => "MICROSTEP16",
        Microstep8 = 1 => "MICROSTEP8",
        Microstep4 = 2 => "MICROSTEP4",
        HalfStep = 3 => "HALFSTEP",
        FullStep = 4 => "FULLSTEP",
    }
}

/// Cached stepper motor properties
#[derive(Debug, Clone)]
pub struct StepperMotorCache {
    motor_state: StepperMotorState,
    pullin_speed: f64,
    max_accel: f64,
    max_speed: f64,
    stepping: Stepping,
    overcurrent: i32,
    t_curr_stop: i32,
    t_curr_run: i32,
    aux_signal: i32,
}

impl Default for StepperMotorCache {
    fn default() -> Self {
        Self {
            motor_state: StepperMotorState::Invalid,
            pullin_speed: f64::NAN,
            max_accel: f64::NAN,
            max_speed: f64::NAN,
            stepping: Stepping::Invalid,
            overcurrent: invalid::INT,
            t_curr_stop: invalid::INT,
            t_curr_run: invalid::INT,
            aux_signal: invalid::INT,
        }
    }
}

/// Proxy of a stepper motor controller
#[derive(Debug)]
pub struct StepperMotorProxy {
    base: ProxyBase<dyn StepperMotorHardware, StepperMotorCache>,
}

impl FunctionProxy for StepperMotorProxy {
    const CLASS: FunctionClass = FunctionClass::StepperMotor;
    type Hardware = dyn StepperMotorHardware;
    type Cache = StepperMotorCache;

    fn new(base: ProxyBase<dyn StepperMotorHardware, StepperMotorCache>) -> Self {
        Self { base }
    }

    fn base(&self) -> &ProxyBase<dyn StepperMotorHardware, StepperMotorCache> {
        &self.base
    }

    fn select(handle: &FunctionHandle) -> Option<Arc<dyn StepperMotorHardware>> {
        match handle {
            FunctionHandle::StepperMotor(hw) => Some(hw.clone()),
            _ => None,
        }
    }

    fn refresh_config(&self) {
        let b = &self.base;
        b.refresh("pullin_speed", |c| &mut c.pullin_speed, |hw| hw.get_pullin_speed().map(sentinel::double));
        b.refresh("max_accel", |c| &mut c.max_accel, |hw| hw.get_max_accel().map(sentinel::double));
        b.refresh("max_speed", |c| &mut c.max_speed, |hw| hw.get_max_speed().map(sentinel::double));
        b.refresh("stepping", |c| &mut c.stepping, |hw| hw.get_stepping().map(Stepping::from_library));
        b.refresh("overcurrent", |c| &mut c.overcurrent, |hw| hw.get_overcurrent());
        b.refresh("t_curr_stop", |c| &mut c.t_curr_stop, |hw| hw.get_t_curr_stop());
        b.refresh("t_curr_run", |c| &mut c.t_curr_run, |hw| hw.get_t_curr_run());
        b.refresh("aux_signal", |c| &mut c.aux_signal, |hw| hw.get_aux_signal());
    }

    fn refresh_cache(&self) {
        self.base.refresh("motor_state", |c| &mut c.motor_state, |hw| {
            hw.get_motor_state().map(StepperMotorState::from_library)
        });
    }

    fn parse_advertised(&self, value: &str) {
        let state = StepperMotorState::from_name(value);
        if !state.is_invalid() {
            self.base.store("motor_state", |c| &mut c.motor_state, state);
        }
    }
}

impl StepperMotorProxy {
    /// Read the controller state
    pub fn get_motor_state(&self) -> Result<StepperMotorState> {
        self.base.read(|hw| hw.get_motor_state().map(StepperMotorState::from_library))
    }

    /// Cached controller state
    pub fn motor_state(&self) -> StepperMotorState {
        self.base.cached(|c| &c.motor_state)
    }

    /// Read the diagnostic bits of the controller
    pub fn get_diags(&self) -> Result<i32> {
        self.base.read(|hw| hw.get_diags())
    }

    /// Read the current position, in steps
    pub fn get_step_pos(&self) -> Result<f64> {
        self.base.read(|hw| hw.get_step_pos().map(sentinel::double))
    }

    /// Redefine the current position without moving
    pub fn set_step_pos(&self, value: f64) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_step_pos(v))
    }

    /// Read the current speed, in steps per second
    pub fn get_speed(&self) -> Result<f64> {
        self.base.read(|hw| hw.get_speed().map(sentinel::double))
    }

    /// Read the pull-in speed
    pub fn get_pullin_speed(&self) -> Result<f64> {
        self.base.read(|hw| hw.get_pullin_speed().map(sentinel::double))
    }

    /// Change the pull-in speed
    pub fn set_pullin_speed(&self, value: f64) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_pullin_speed(v))
    }

    /// Cached pull-in speed
    pub fn pullin_speed(&self) -> f64 {
        self.base.cached(|c| &c.pullin_speed)
    }

    /// Like `set_pullin_speed`, skipped when the value matches the cache
    pub fn apply_pullin_speed(&self, value: f64) -> Result<()> {
        self.base.apply("pullin_speed", |c| &mut c.pullin_speed, value, |hw, v| hw.set_pullin_speed(v))
    }

    /// Read the maximum acceleration
    pub fn get_max_accel(&self) -> Result<f64> {
        self.base.read(|hw| hw.get_max_accel().map(sentinel::double))
    }

    /// Change the maximum acceleration
    pub fn set_max_accel(&self, value: f64) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_max_accel(v))
    }

    /// Cached maximum acceleration
    pub fn max_accel(&self) -> f64 {
        self.base.cached(|c| &c.max_accel)
    }

    /// Like `set_max_accel`, skipped when the value matches the cache
    pub fn apply_max_accel(&self, value: f64) -> Result<()> {
        self.base.apply("max_accel", |c| &mut c.max_accel, value, |hw, v| hw.set_max_accel(v))
    }

    /// Read the maximum speed
    pub fn get_max_speed(&self) -> Result<f64> {
        self.base.read(|hw| hw.get_max_speed().map(sentinel::double))
    }

    /// Change the maximum speed
    pub fn set_max_speed(&self, value: f64) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_max_speed(v))
    }

    /// Cached maximum speed
    pub fn max_speed(&self) -> f64 {
        self.base.cached(|c| &c.max_speed)
    }

    /// Like `set_max_speed`, skipped when the value matches the cache
    pub fn apply_max_speed(&self, value: f64) -> Result<()> {
        self.base.apply("max_speed", |c| &mut c.max_speed, value, |hw, v| hw.set_max_speed(v))
    }

    /// Read the stepping mode
    pub fn get_stepping(&self) -> Result<Stepping> {
        self.base.read(|hw| hw.get_stepping().map(Stepping::from_library))
    }

    /// Change the stepping mode
    pub fn set_stepping(&self, value: Stepping) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_stepping(v.to_library()))
    }

    /// Cached stepping mode
    pub fn stepping(&self) -> Stepping {
        self.base.cached(|c| &c.stepping)
    }

    /// Like `set_stepping`, skipped when the value matches the cache
    pub fn apply_stepping(&self, value: Stepping) -> Result<()> {
        self.base.apply("stepping", |c| &mut c.stepping, value, |hw, v| hw.set_stepping(v.to_library()))
    }

    /// Read the overcurrent limit, in mA
    pub fn get_overcurrent(&self) -> Result<i32> {
        self.base.read(|hw| hw.get_overcurrent())
    }

    /// Change the overcurrent limit
    pub fn set_overcurrent(&self, value: i32) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_overcurrent(v))
    }

    /// Cached overcurrent limit
    pub fn overcurrent(&self) -> i32 {
        self.base.cached(|c| &c.overcurrent)
    }

    /// Like `set_overcurrent`, skipped when the value matches the cache
    pub fn apply_overcurrent(&self, value: i32) -> Result<()> {
        self.base.apply("overcurrent", |c| &mut c.overcurrent, value, |hw, v| hw.set_overcurrent(v))
    }

    /// Read the torque at standstill, in percent
    pub fn get_t_curr_stop(&self) -> Result<i32> {
        self.base.read(|hw| hw.get_t_curr_stop())
    }

    /// Change the torque at standstill
    pub fn set_t_curr_stop(&self, value: i32) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_t_curr_stop(v))
    }

    /// Cached torque at standstill
    pub fn t_curr_stop(&self) -> i32 {
        self.base.cached(|c| &c.t_curr_stop)
    }

    /// Like `set_t_curr_stop`, skipped when the value matches the cache
    pub fn apply_t_curr_stop(&self, value: i32) -> Result<()> {
        self.base.apply("t_curr_stop", |c| &mut c.t_curr_stop, value, |hw, v| hw.set_t_curr_stop(v))
    }

    /// Read the torque while moving, in percent
    pub fn get_t_curr_run(&self) -> Result<i32> {
        self.base.read(|hw| hw.get_t_curr_run())
    }

    /// Change the torque while moving
    pub fn set_t_curr_run(&self, value: i32) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_t_curr_run(v))
    }

    /// Cached torque while moving
    pub fn t_curr_run(&self) -> i32 {
        self.base.cached(|c| &c.t_curr_run)
    }

    /// Like `set_t_curr_run`, skipped when the value matches the cache
    pub fn apply_t_curr_run(&self, value: i32) -> Result<()> {
        self.base.apply("t_curr_run", |c| &mut c.t_curr_run, value, |hw, v| hw.set_t_curr_run(v))
    }

    /// Read the alert configuration
    pub fn get_alert_mode(&self) -> Result<String> {
        self.base.read(|hw| hw.get_alert_mode())
    }

    /// Change the alert configuration
    pub fn set_alert_mode(&self, value: &str) -> Result<()> {
        self.base.write(value.to_string(), |hw, v| hw.set_alert_mode(&v))
    }

    /// Read the auxiliary output mode
    pub fn get_aux_mode(&self) -> Result<String> {
        self.base.read(|hw| hw.get_aux_mode())
    }

    /// Change the auxiliary output mode
    pub fn set_aux_mode(&self, value: &str) -> Result<()> {
        self.base.write(value.to_string(), |hw, v| hw.set_aux_mode(&v))
    }

    /// Read the auxiliary output signal
    pub fn get_aux_signal(&self) -> Result<i32> {
        self.base.read(|hw| hw.get_aux_signal())
    }

    /// Change the auxiliary output signal
    pub fn set_aux_signal(&self, value: i32) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_aux_signal(v))
    }

    /// Cached auxiliary output signal
    pub fn aux_signal(&self) -> i32 {
        self.base.cached(|c| &c.aux_signal)
    }

    /// Like `set_aux_signal`, skipped when the value matches the cache
    pub fn apply_aux_signal(&self, value: i32) -> Result<()> {
        self.base.apply("aux_signal", |c| &mut c.aux_signal, value, |hw, v| hw.set_aux_signal(v))
    }

    /// Reinitialize the controller and clear alerts
    pub fn reset(&self) -> Result<()> {
        self.base.read(|hw| hw.reset())
    }

    /// Move at `speed` until the home switch triggers
    pub fn find_home_position(&self, speed: f64) -> Result<()> {
        self.base.read(|hw| hw.find_home_position(speed))
    }

    /// Run continuously at `speed`, in steps per second
    pub fn change_speed(&self, speed: f64) -> Result<()> {
        self.base.read(|hw| hw.change_speed(speed))
    }

    /// Move to an absolute position, in steps
    pub fn move_to(&self, abs_pos: f64) -> Result<()> {
        self.base.read(|hw| hw.move_to(abs_pos))
    }

    /// Move by a relative amount of steps
    pub fn move_rel(&self, rel_pos: f64) -> Result<()> {
        self.base.read(|hw| hw.move_rel(rel_pos))
    }

    /// Move by `rel_pos` steps, no faster than `max_speed`
    pub fn move_rel_slow(&self, rel_pos: f64, max_speed: f64) -> Result<()> {
        self.base.read(|hw| hw.move_rel_slow(rel_pos, max_speed))
    }

    /// Queue a pause
    pub fn pause(&self, wait_ms: i32) -> Result<()> {
        self.base.read(|hw| hw.pause(wait_ms))
    }

    /// Stop at once, without deceleration
    pub fn emergency_stop(&self) -> Result<()> {
        self.base.read(|hw| hw.emergency_stop())
    }

    /// Move one step in the direction opposite the last move
    pub fn alert_step_out(&self) -> Result<()> {
        self.base.read(|hw| hw.alert_step_out())
    }

    /// Move one step in direction `dir`
    pub fn alert_step_dir(&self, dir: i32) -> Result<()> {
        self.base.read(|hw| hw.alert_step_dir(dir))
    }

    /// Stop and hold the current position
    pub fn abort_and_brake(&self) -> Result<()> {
        self.base.read(|hw| hw.abort_and_brake())
    }

    /// Stop and release the motor
    pub fn abort_and_hi_z(&self) -> Result<()> {
        self.base.read(|hw| hw.abort_and_hi_z())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::ProxyManager;
    use crate::proxy::ProxyObject;
    use crate::sim::{SimModule, SimulatedLibrary};

    fn setup() -> (Arc<SimulatedLibrary>, Arc<StepperMotorProxy>) {
        let library = Arc::new(SimulatedLibrary::new());
        library.plug(
            SimModule::new("STEPPER1-00001")
                .with_function(FunctionClass::StepperMotor, "stepperMotor1")
                .with_function(FunctionClass::StepperMotor, "stepperMotor2"),
        );
        let manager = ProxyManager::new(library.clone());
        let proxy = StepperMotorProxy::find(&manager, "stepperMotor2");
        (library, proxy)
    }

    #[test]
    fn test_binds_requested_channel() {
        let (_library, proxy) = setup();
        assert_eq!(proxy.hardware_id(), "STEPPER1-00001.stepperMotor2");
        assert_eq!(proxy.motor_state(), StepperMotorState::Stop);
        assert_eq!(proxy.stepping(), Stepping::Microstep16);
        assert_eq!(proxy.max_speed(), 2000.0);
        assert_eq!(proxy.t_curr_run(), 80);
    }

    #[test]
    fn test_motion_updates_state() {
        let (_library, proxy) = setup();
        proxy.find_home_position(100.0).unwrap();
        assert_eq!(proxy.motor_state(), StepperMotorState::Run);

        proxy.move_to(400.0).unwrap();
        proxy.move_rel(-50.0).unwrap();
        assert_eq!(proxy.get_step_pos().unwrap(), 350.0);

        proxy.emergency_stop().unwrap();
        assert_eq!(proxy.motor_state(), StepperMotorState::Alert);
        proxy.abort_and_hi_z().unwrap();
        assert_eq!(proxy.motor_state(), StepperMotorState::HiZ);
        proxy.reset().unwrap();
        assert_eq!(proxy.motor_state(), StepperMotorState::Stop);
    }

    #[test]
    fn test_stepping_forwarded_with_library_code() {
        let (library, proxy) = setup();
        proxy.apply_stepping(Stepping::HalfStep).unwrap();
        let hw = library.function("STEPPER1-00001.stepperMotor2").unwrap();
        assert_eq!(hw.journal(), vec!["set_stepping(3)".to_string()]);
        assert_eq!(proxy.stepping().code(), 4);
    }

    #[test]
    fn test_string_modes() {
        let (_library, proxy) = setup();
        proxy.set_aux_mode("analog").unwrap();
        assert_eq!(proxy.get_aux_mode().unwrap(), "analog");
    }
}
