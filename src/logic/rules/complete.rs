use super::variables::{
    HUMIDITY as H, IS_RAINING, RAIN_PROBABILITY as RP, SOIL_MOISTURE as SM, TEMPERATURE as T,
};
use crate::logic::fuzzy::{Antecedent, Rule};

fn is(variable: &str, label: &str) -> Antecedent {
    Antecedent::is(variable, label)
}

/// Complete 13-rule irrigation policy.
///
/// Crosses soil moisture, forecast rain probability, temperature and
/// humidity. The first rule (wet soil OR raining => none) is the override:
/// under max aggregation it keeps a full-strength "none" in the output
/// whenever it fires, whatever the other rules say.
///
/// | soil  | rain prob | temp | humidity | volume |
/// |-------|-----------|------|----------|--------|
/// | wet or raining | - | - | -         | none   |
/// | moist | high      | -    | -        | none   |
/// | moist | low       | hot  | wet      | none   |
/// | moist | low       | hot  | moderate | low    |
/// | moist | low       | hot  | dry      | low    |
/// | moist | low       | cool | -        | low    |
/// | dry   | high      | -    | -        | low    |
/// | dry   | low       | hot  | wet      | low    |
/// | dry   | low       | hot  | moderate | high   |
/// | dry   | low       | hot  | dry      | high   |
/// | dry   | low       | cool | wet      | none   |
/// | dry   | low       | cool | moderate | low    |
/// | dry   | low       | cool | dry      | low    |
pub fn rules() -> Vec<Rule> {
    let moist_low = || is(SM, "moist").and(is(RP, "low"));
    let dry_low = || is(SM, "dry").and(is(RP, "low"));

    vec![
        Rule::new(is(SM, "wet").or(is(IS_RAINING, "yes")), "none"),
        Rule::new(is(SM, "moist").and(is(RP, "high")), "none"),
        Rule::new(moist_low().and(is(T, "hot")).and(is(H, "wet")), "none"),
        Rule::new(moist_low().and(is(T, "hot")).and(is(H, "moderate")), "low"),
        Rule::new(moist_low().and(is(T, "hot")).and(is(H, "dry")), "low"),
        Rule::new(moist_low().and(is(T, "cool")), "low"),
        Rule::new(is(SM, "dry").and(is(RP, "high")), "low"),
        Rule::new(dry_low().and(is(T, "hot")).and(is(H, "wet")), "low"),
        Rule::new(dry_low().and(is(T, "hot")).and(is(H, "moderate")), "high"),
        Rule::new(dry_low().and(is(T, "hot")).and(is(H, "dry")), "high"),
        Rule::new(dry_low().and(is(T, "cool")).and(is(H, "wet")), "none"),
        Rule::new(dry_low().and(is(T, "cool")).and(is(H, "moderate")), "low"),
        Rule::new(dry_low().and(is(T, "cool")).and(is(H, "dry")), "low"),
    ]
}
