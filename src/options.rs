//! Dynamic solver options.
//!
//! Options live in a string-keyed registry of type-erased values so that every
//! tolerance and policy knob is configurable through one surface. Typed access
//! goes through [`Options::get_option`] / [`Options::set_option`]; the engines
//! take a snapshot through [`InternalOptions`].
//!
//! | Option Name       | Type    | Default    | Description                                        |
//! |-------------------|---------|------------|----------------------------------------------------|
//! | `precision`       | `f64`   | `1e-9`     | Integrality / zero-filtering tolerance             |
//! | `tolerance`       | `f64`   | `0.0`      | Relative MILP optimality gap                       |
//! | `timeout_ms`      | `u64`   | `u64::MAX` | Wall-clock limit in milliseconds (`MAX` = none)    |
//! | `exit_on_cycles`  | `bool`  | `true`     | Terminate on cycle suspicion instead of Bland's    |
//! | `pivot_tolerance` | `f64`   | `1e-12`    | Magnitude below which a pivot is treated as zero   |
//! | `cost_tolerance`  | `f64`   | `1e-9`     | Reduced-cost optimality tolerance                  |
//! | `full_output`     | `bool`  | `false`    | Include zero-valued variables in the solution      |
//! | `validate`        | `bool`  | `false`    | Run structural model validation before solving     |
//! | `verbose`         | `bool`  | `false`    | Print an iteration table while solving             |
//! | `use_mir_cuts`    | `bool`  | `false`    | Accepted for compatibility; has no effect          |

use std::any::Any;
use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

use dyn_clone::DynClone;

use crate::E;

pub trait OptionTrait: Any + Sync + Send + DynClone {}
impl OptionTrait for &'static str {}
impl OptionTrait for String {}
impl OptionTrait for bool {}
impl OptionTrait for usize {}
impl OptionTrait for u8 {}
impl OptionTrait for u16 {}
impl OptionTrait for u32 {}
impl OptionTrait for u64 {}
impl OptionTrait for i8 {}
impl OptionTrait for i16 {}
impl OptionTrait for i32 {}
impl OptionTrait for i64 {}
impl OptionTrait for f32 {}
impl OptionTrait for f64 {}

impl Clone for Box<dyn OptionTrait> {
    fn clone(&self) -> Self {
        dyn_clone::clone_box(&**self)
    }
}

static OPTION_REGISTRY: LazyLock<HashMap<String, Box<dyn OptionTrait>>> = LazyLock::new(|| {
    let mut map: HashMap<String, Box<dyn OptionTrait>> = HashMap::new();
    map.extend([
        ("precision".to_string(), Box::new(1e-9f64) as Box<dyn OptionTrait>),
        ("tolerance".to_string(), Box::new(0.0f64) as Box<dyn OptionTrait>),
        ("timeout_ms".to_string(), Box::new(u64::MAX) as Box<dyn OptionTrait>),
        ("exit_on_cycles".to_string(), Box::new(true) as Box<dyn OptionTrait>),
        ("pivot_tolerance".to_string(), Box::new(1e-12f64) as Box<dyn OptionTrait>),
        ("cost_tolerance".to_string(), Box::new(1e-9f64) as Box<dyn OptionTrait>),
        ("full_output".to_string(), Box::new(false) as Box<dyn OptionTrait>),
        ("validate".to_string(), Box::new(false) as Box<dyn OptionTrait>),
        ("verbose".to_string(), Box::new(false) as Box<dyn OptionTrait>),
        ("use_mir_cuts".to_string(), Box::new(false) as Box<dyn OptionTrait>),
    ]);
    map
});

/// Registry of solver options, seeded from the crate-wide defaults.
#[derive(Clone)]
pub struct Options {
    map: HashMap<String, Box<dyn OptionTrait>>,
}

impl Default for Options {
    fn default() -> Self {
        Self::new()
    }
}

impl Options {
    pub fn new() -> Self {
        let map = OPTION_REGISTRY.clone();
        Self { map }
    }

    pub fn get_option<T: OptionTrait>(&self, name: &str) -> Option<T>
    where
        T: Clone,
    {
        self.map
            .get(name)
            .and_then(|v| (v.as_ref() as &dyn Any).downcast_ref::<T>())
            .cloned()
    }

    /// Replaces a registered option. The value must match the registered type.
    pub fn set_option<T: OptionTrait>(&mut self, name: &str, value: T) -> Result<(), String> {
        match self.map.get(name) {
            None => Err(format!("Option '{}' is not registered.", name)),
            Some(current) => {
                if (current.as_ref() as &dyn Any).downcast_ref::<T>().is_some() {
                    self.map.insert(name.to_string(), Box::new(value));
                    Ok(())
                } else {
                    Err(format!(
                        "Type mismatch for option '{}'. Expected {}.",
                        name,
                        std::any::type_name::<T>(),
                    ))
                }
            }
        }
    }
}

/// Typed snapshot of the registry taken once per solve.
#[derive(Debug, Clone)]
pub(crate) struct InternalOptions {
    pub precision: E,
    pub tolerance: E,
    pub timeout: Option<Duration>,
    pub exit_on_cycles: bool,
    pub pivot_tolerance: E,
    pub cost_tolerance: E,
    pub full_output: bool,
    pub validate: bool,
}

impl From<&Options> for InternalOptions {
    fn from(options: &Options) -> Self {
        let timeout_ms = options.get_option::<u64>("timeout_ms").unwrap_or(u64::MAX);
        Self {
            precision: options.get_option::<f64>("precision").unwrap_or(1e-9),
            tolerance: options.get_option::<f64>("tolerance").unwrap_or(0.0),
            timeout: (timeout_ms != u64::MAX).then(|| Duration::from_millis(timeout_ms)),
            exit_on_cycles: options.get_option::<bool>("exit_on_cycles").unwrap_or(true),
            pivot_tolerance: options
                .get_option::<f64>("pivot_tolerance")
                .unwrap_or(1e-12),
            cost_tolerance: options.get_option::<f64>("cost_tolerance").unwrap_or(1e-9),
            full_output: options.get_option::<bool>("full_output").unwrap_or(false),
            validate: options.get_option::<bool>("validate").unwrap_or(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_registered() {
        let options = Options::new();
        assert_eq!(options.get_option::<f64>("precision"), Some(1e-9));
        assert_eq!(options.get_option::<bool>("exit_on_cycles"), Some(true));
        assert_eq!(options.get_option::<u64>("timeout_ms"), Some(u64::MAX));
    }

    #[test]
    fn set_option_rejects_unknown_names_and_wrong_types() {
        let mut options = Options::new();
        assert!(options.set_option("precision", 1e-6f64).is_ok());
        assert_eq!(options.get_option::<f64>("precision"), Some(1e-6));

        assert!(options.set_option("no_such_option", 1.0f64).is_err());
        assert!(options.set_option("precision", true).is_err());
    }

    #[test]
    fn internal_snapshot_reflects_overrides() {
        let mut options = Options::new();
        options.set_option("timeout_ms", 250u64).unwrap();
        options.set_option("tolerance", 0.05f64).unwrap();

        let internal = InternalOptions::from(&options);
        assert_eq!(internal.timeout, Some(Duration::from_millis(250)));
        assert_eq!(internal.tolerance, 0.05);
    }
}
