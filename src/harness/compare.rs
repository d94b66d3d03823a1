use super::types::{ResponseMetrics, TestCase};
use strum::Display;

/// Where a response sits among its siblings for one metric. Lower is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Rank {
    Best,
    Worst,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseRanking {
    pub model: String,
    pub cost: Rank,
    pub latency: Rank,
    pub total_tokens: Rank,
}

fn rank_of<T: PartialOrd + Copy>(values: &[T], value: T) -> Rank {
    let min = values.iter().copied().reduce(|a, b| if b < a { b } else { a });
    let max = values.iter().copied().reduce(|a, b| if b > a { b } else { a });
    match (min, max) {
        (Some(min), _) if value == min => Rank::Best,
        (_, Some(max)) if value == max => Rank::Worst,
        _ => Rank::Neutral,
    }
}

/// Ranks every successful response of a test case on cost, latency and total
/// tokens. Failed entries are left out, both from the result and from the
/// extremes.
pub fn rank_responses(test_case: &TestCase) -> Vec<ResponseRanking> {
    let answered: Vec<(&String, &ResponseMetrics)> = test_case
        .responses
        .iter()
        .filter(|(_, response)| !response.is_failure())
        .collect();

    let costs: Vec<f64> = answered.iter().map(|(_, r)| r.usage.cost).collect();
    let latencies: Vec<f64> = answered.iter().map(|(_, r)| r.usage.latency).collect();
    let tokens: Vec<u64> = answered.iter().map(|(_, r)| r.usage.total_tokens).collect();

    answered
        .iter()
        .map(|(model, response)| ResponseRanking {
            model: (*model).clone(),
            cost: rank_of(&costs, response.usage.cost),
            latency: rank_of(&latencies, response.usage.latency),
            total_tokens: rank_of(&tokens, response.usage.total_tokens),
        })
        .collect()
}
