use super::variables::{IS_RAINING, RAIN_PROBABILITY, SOIL_MOISTURE, TEMPERATURE};
use crate::logic::fuzzy::{Antecedent, Rule};

/// Reduced 4-rule policy kept for devices still running the early cloud
/// controller. It ignores humidity and makes any dry soil at least "low", so
/// it irrigates more eagerly than the complete set.
pub fn rules() -> Vec<Rule> {
    let dry = || Antecedent::is(SOIL_MOISTURE, "dry");

    vec![
        Rule::new(
            Antecedent::is(SOIL_MOISTURE, "wet").or(Antecedent::is(IS_RAINING, "yes")),
            "none",
        ),
        Rule::new(
            Antecedent::is(SOIL_MOISTURE, "moist").and(Antecedent::is(RAIN_PROBABILITY, "high")),
            "none",
        ),
        Rule::new(
            dry()
                .and(Antecedent::is(RAIN_PROBABILITY, "low"))
                .and(Antecedent::is(TEMPERATURE, "hot")),
            "high",
        ),
        Rule::new(dry(), "low"),
    ]
}
