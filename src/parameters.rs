use std::collections::HashMap;
use std::fmt;

/// Parameter descriptor - defines the characteristics of one control
pub trait ParameterDescriptor: Send + Sync + fmt::Debug {
    /// Parameter name
    fn name(&self) -> &'static str;

    /// Minimum value
    fn min_value(&self) -> f32;

    /// Maximum value
    fn max_value(&self) -> f32;

    /// Default value
    fn default_value(&self) -> f32;

    /// Unit (s, semitones, ... )
    fn unit(&self) -> &'static str {
        ""
    }

    /// Value validation
    fn validate(&self, value: f32) -> Result<f32, ParameterError> {
        let clamped = value.clamp(self.min_value(), self.max_value());
        if clamped != value {
            Err(ParameterError::OutOfRange {
                value,
                min: self.min_value(),
                max: self.max_value(),
            })
        } else {
            Ok(clamped)
        }
    }

    /// Value formatting for display
    fn format_value(&self, value: f32) -> String {
        if self.unit().is_empty() {
            format!("{:.2}", value)
        } else {
            format!("{:.2} {}", value, self.unit())
        }
    }
}

/// Parameter error type
#[derive(Debug, Clone)]
pub enum ParameterError {
    NotFound { name: String },
    OutOfRange { value: f32, min: f32, max: f32 },
}

impl fmt::Display for ParameterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterError::NotFound { name } => {
                write!(f, "Parameter '{}' not found", name)
            }
            ParameterError::OutOfRange { value, min, max } => {
                write!(f, "Parameter value {} out of range [{}, {}]", value, min, max)
            }
        }
    }
}

impl std::error::Error for ParameterError {}

/// Parameter management trait - the uniform surface the controls talk to
pub trait Parameterizable {
    /// Set a parameter
    fn set_parameter(&mut self, name: &str, value: f32) -> Result<(), ParameterError>;

    /// Get a parameter
    fn get_parameter(&self, name: &str) -> Result<f32, ParameterError>;

    /// Get all parameters
    fn get_all_parameters(&self) -> HashMap<String, f32>;

    /// Get the parameter descriptor list
    fn get_parameter_descriptors(&self) -> Vec<Box<dyn ParameterDescriptor>>;

    /// Check whether a parameter exists
    fn has_parameter(&self, name: &str) -> bool {
        self.get_parameter(name).is_ok()
    }
}

/// Basic parameter descriptor implementation
#[derive(Debug, Clone)]
pub struct BasicParameter {
    pub name: &'static str,
    pub min: f32,
    pub max: f32,
    pub default: f32,
    pub unit: &'static str,
}

impl BasicParameter {
    pub fn new(name: &'static str, min: f32, max: f32, default: f32) -> Self {
        Self {
            name,
            min,
            max,
            default,
            unit: "",
        }
    }

    pub fn with_unit(mut self, unit: &'static str) -> Self {
        self.unit = unit;
        self
    }
}

impl ParameterDescriptor for BasicParameter {
    fn name(&self) -> &'static str {
        self.name
    }

    fn min_value(&self) -> f32 {
        self.min
    }

    fn max_value(&self) -> f32 {
        self.max
    }

    fn default_value(&self) -> f32 {
        self.default
    }

    fn unit(&self) -> &'static str {
        self.unit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestControls {
        octave: f32,
        reverb_decay: f32,
    }

    impl TestControls {
        fn new() -> Self {
            Self {
                octave: 4.0,
                reverb_decay: 1.0,
            }
        }
    }

    impl Parameterizable for TestControls {
        fn set_parameter(&mut self, name: &str, value: f32) -> Result<(), ParameterError> {
            match name {
                "octave" => {
                    self.octave = BasicParameter::new("octave", 2.0, 7.0, 4.0).validate(value)?;
                    Ok(())
                }
                "reverb_decay" => {
                    self.reverb_decay =
                        BasicParameter::new("reverb_decay", 0.2, 2.0, 1.0).validate(value)?;
                    Ok(())
                }
                _ => Err(ParameterError::NotFound {
                    name: name.to_string(),
                }),
            }
        }

        fn get_parameter(&self, name: &str) -> Result<f32, ParameterError> {
            match name {
                "octave" => Ok(self.octave),
                "reverb_decay" => Ok(self.reverb_decay),
                _ => Err(ParameterError::NotFound {
                    name: name.to_string(),
                }),
            }
        }

        fn get_all_parameters(&self) -> HashMap<String, f32> {
            let mut params = HashMap::new();
            params.insert("octave".to_string(), self.octave);
            params.insert("reverb_decay".to_string(), self.reverb_decay);
            params
        }

        fn get_parameter_descriptors(&self) -> Vec<Box<dyn ParameterDescriptor>> {
            vec![
                Box::new(BasicParameter::new("octave", 2.0, 7.0, 4.0)),
                Box::new(BasicParameter::new("reverb_decay", 0.2, 2.0, 1.0).with_unit("s")),
            ]
        }
    }

    #[test]
    fn test_parameter_setting() {
        let mut controls = TestControls::new();

        assert!(controls.set_parameter("octave", 5.0).is_ok());
        assert_eq!(controls.get_parameter("octave").unwrap(), 5.0);

        // Out of range values are rejected
        assert!(controls.set_parameter("octave", 9.0).is_err());
        assert!(controls.set_parameter("reverb_decay", 0.0).is_err());

        // Unknown parameter
        assert!(controls.set_parameter("nonexistent", 1.0).is_err());
        assert!(!controls.has_parameter("nonexistent"));
    }

    #[test]
    fn test_format_value() {
        let plain = BasicParameter::new("octave", 2.0, 7.0, 4.0);
        assert_eq!(plain.format_value(4.0), "4.00");

        let with_unit = BasicParameter::new("reverb_decay", 0.2, 2.0, 1.0).with_unit("s");
        assert_eq!(with_unit.format_value(1.5), "1.50 s");
    }
}
