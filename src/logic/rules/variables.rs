use crate::logic::fuzzy::{FuzzyError, MembershipFunction, VariableRegistry};

pub const SOIL_MOISTURE: &str = "soil_moisture";
pub const TEMPERATURE: &str = "temperature";
pub const HUMIDITY: &str = "humidity";
pub const IS_RAINING: &str = "is_raining";
pub const RAIN_PROBABILITY: &str = "rain_probability";
pub const IRRIGATION_VOLUME: &str = "irrigation_volume";

/// Linguistic variables shared by the built-in irrigation rule sets.
///
/// - soil_moisture (%): dry / moist / wet, Gaussian at 20 / 50 / 80, sigma 10
/// - temperature (°C, 0-50): cool / hot, overlapping between 26 and 29
/// - humidity (%): dry / moderate / wet
/// - is_raining (0/1): no / yes singletons
/// - rain_probability (%): low / high
/// - irrigation_volume (0-100, step 1): none / low / high
pub fn irrigation_variables() -> Result<VariableRegistry, FuzzyError> {
    use MembershipFunction as Mf;

    let mut registry = VariableRegistry::new();

    registry.define_variable(SOIL_MOISTURE, 0.0, 100.0, 1.0)?;
    registry.add_set(SOIL_MOISTURE, "dry", Mf::gaussian(20.0, 10.0)?)?;
    registry.add_set(SOIL_MOISTURE, "moist", Mf::gaussian(50.0, 10.0)?)?;
    registry.add_set(SOIL_MOISTURE, "wet", Mf::gaussian(80.0, 10.0)?)?;

    registry.define_variable(TEMPERATURE, 0.0, 50.0, 1.0)?;
    registry.add_set(TEMPERATURE, "cool", Mf::trapezoidal(0.0, 0.0, 24.0, 29.0)?)?;
    registry.add_set(TEMPERATURE, "hot", Mf::trapezoidal(26.0, 31.0, 50.0, 50.0)?)?;

    registry.define_variable(HUMIDITY, 0.0, 100.0, 1.0)?;
    registry.add_set(HUMIDITY, "dry", Mf::triangular(0.0, 0.0, 62.0)?)?;
    registry.add_set(HUMIDITY, "moderate", Mf::triangular(58.0, 70.0, 82.0)?)?;
    registry.add_set(HUMIDITY, "wet", Mf::triangular(80.0, 100.0, 100.0)?)?;

    registry.define_variable(IS_RAINING, 0.0, 1.0, 1.0)?;
    registry.add_set(IS_RAINING, "no", Mf::triangular(0.0, 0.0, 0.0)?)?;
    registry.add_set(IS_RAINING, "yes", Mf::triangular(1.0, 1.0, 1.0)?)?;

    registry.define_variable(RAIN_PROBABILITY, 0.0, 100.0, 1.0)?;
    registry.add_set(RAIN_PROBABILITY, "low", Mf::triangular(0.0, 0.0, 40.0)?)?;
    registry.add_set(
        RAIN_PROBABILITY,
        "high",
        Mf::trapezoidal(30.0, 70.0, 100.0, 100.0)?,
    )?;

    registry.define_variable(IRRIGATION_VOLUME, 0.0, 100.0, 1.0)?;
    registry.add_set(IRRIGATION_VOLUME, "none", Mf::trapezoidal(0.0, 0.0, 5.0, 18.0)?)?;
    registry.add_set(IRRIGATION_VOLUME, "low", Mf::trapezoidal(13.0, 30.0, 50.0, 65.0)?)?;
    registry.add_set(
        IRRIGATION_VOLUME,
        "high",
        Mf::trapezoidal(70.0, 85.0, 100.0, 100.0)?,
    )?;

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defines_all_variables() {
        let registry = irrigation_variables().unwrap();
        for name in [
            SOIL_MOISTURE,
            TEMPERATURE,
            HUMIDITY,
            IS_RAINING,
            RAIN_PROBABILITY,
            IRRIGATION_VOLUME,
        ] {
            assert!(registry.get(name).is_some(), "missing {}", name);
        }
        assert_eq!(registry.variables().len(), 6);
    }

    #[test]
    fn temperature_sets_overlap() {
        let registry = irrigation_variables().unwrap();
        // 27.5°C is partly cool and partly hot
        let cool = registry.degree_of(TEMPERATURE, "cool", 27.5).unwrap();
        let hot = registry.degree_of(TEMPERATURE, "hot", 27.5).unwrap();
        assert!((cool - 0.3).abs() < 1e-9);
        assert!((hot - 0.3).abs() < 1e-9);
    }

    #[test]
    fn rain_flag_is_crisp() {
        let registry = irrigation_variables().unwrap();
        assert_eq!(registry.degree_of(IS_RAINING, "yes", 1.0), Ok(1.0));
        assert_eq!(registry.degree_of(IS_RAINING, "yes", 0.0), Ok(0.0));
        assert_eq!(registry.degree_of(IS_RAINING, "no", 0.0), Ok(1.0));
        assert_eq!(registry.degree_of(IS_RAINING, "no", 1.0), Ok(0.0));
    }
}
