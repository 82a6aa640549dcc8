use anyhow::Context;
use std::net::SocketAddr;
use types::GaParams;

const GA_PREFIX: &str = "COHORT__GA__";
const PORT_VAR: &str = "COHORT__SERVER__PORT";

/// Engine defaults with any `COHORT__GA__<FIELD>` overrides applied.
pub fn ga_params_from_env() -> anyhow::Result<GaParams> {
    ga_params_from(|key| std::env::var(key).ok())
}

pub fn listen_addr() -> anyhow::Result<SocketAddr> {
    let port = std::env::var(PORT_VAR).unwrap_or_else(|_| "8080".into());
    format!("0.0.0.0:{port}")
        .parse()
        .with_context(|| format!("{PORT_VAR} is not a valid port: {port:?}"))
}

fn ga_params_from(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<GaParams> {
    let mut p = GaParams::default();

    macro_rules! overrides {
        ($($field:ident => $key:literal),* $(,)?) => {
            $(
                let var = format!("{GA_PREFIX}{}", $key);
                if let Some(raw) = lookup(&var) {
                    p.$field = raw
                        .trim()
                        .parse()
                        .with_context(|| format!("{var} has an invalid value: {raw:?}"))?;
                }
            )*
        };
    }

    overrides!(
        population_size => "POPULATION_SIZE",
        generations => "GENERATIONS",
        mutation_rate => "MUTATION_RATE",
        max_mutation_rate => "MAX_MUTATION_RATE",
        crossover_rate => "CROSSOVER_RATE",
        elite_fraction => "ELITE_FRACTION",
        tournament_size => "TOURNAMENT_SIZE",
        feasible_fraction => "FEASIBLE_FRACTION",
        top_fraction => "TOP_FRACTION",
        violation_window => "VIOLATION_WINDOW",
        penalty_escalation => "PENALTY_ESCALATION",
        penalty_cap => "PENALTY_CAP",
        stagnation_limit => "STAGNATION_LIMIT",
        max_classes_per_teacher => "MAX_CLASSES_PER_TEACHER",
        repair_attempts => "REPAIR_ATTEMPTS",
        draw_attempts => "DRAW_ATTEMPTS",
        backtrack_iteration_limit => "BACKTRACK_ITERATION_LIMIT",
        validity_threshold => "VALIDITY_THRESHOLD",
        term_start => "TERM_START",
        term_end => "TERM_END",
    );

    let var = format!("{GA_PREFIX}SEED");
    if let Some(raw) = lookup(&var) {
        let seed = raw
            .trim()
            .parse()
            .with_context(|| format!("{var} has an invalid value: {raw:?}"))?;
        p.seed = Some(seed);
    }

    Ok(p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from(pairs: &[(&str, &str)]) -> anyhow::Result<GaParams> {
        let env: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        ga_params_from(|k| env.get(k).cloned())
    }

    #[test]
    fn no_overrides_means_defaults() {
        assert_eq!(from(&[]).unwrap(), GaParams::default());
    }

    #[test]
    fn overrides_are_parsed_per_field() {
        let p = from(&[
            ("COHORT__GA__POPULATION_SIZE", "80"),
            ("COHORT__GA__MUTATION_RATE", " 0.25 "),
            ("COHORT__GA__SEED", "42"),
            ("COHORT__GA__TERM_END", "2026-02-01"),
            ("UNRELATED", "x"),
        ])
        .unwrap();
        assert_eq!(p.population_size, 80);
        assert_eq!(p.mutation_rate, 0.25);
        assert_eq!(p.seed, Some(42));
        assert_eq!(p.term_end, "2026-02-01");
        assert_eq!(p.generations, GaParams::default().generations);
    }

    #[test]
    fn bad_values_name_the_variable() {
        let err = from(&[("COHORT__GA__GENERATIONS", "many")]).unwrap_err();
        assert!(err.to_string().contains("COHORT__GA__GENERATIONS"));
    }
}
