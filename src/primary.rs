//! Primary name and email selection for merged people.
//!
//! Each person gets the value with the most recent commits when the person
//! was active enough recently (at least `min_recent_count` recent commits
//! summed over all candidate values), otherwise the value with the most
//! commits overall. Ties keep the value seen first.

use crate::error::ReduceError;
use crate::person::{FrequencyTable, People};
use crate::reduce::ReduceResult;

/// Assign `primary_name` and `primary_email` on every person.
///
/// Names are looked up by their bare name, emails verbatim. A value missing
/// from its table is an error and stops the pass at that person.
pub fn set_primary_values(
    people: &mut People,
    name_freqs: &FrequencyTable,
    email_freqs: &FrequencyTable,
    min_recent_count: u64,
) -> ReduceResult<()> {
    for (_, person) in people.iter_mut() {
        let names = person.names();
        if let Some(name) = select_primary(&names, name_freqs, min_recent_count)? {
            person.primary_name = name;
        }
        if let Some(email) = select_primary(&person.emails, email_freqs, min_recent_count)? {
            person.primary_email = email;
        }
    }
    tracing::debug!(people = people.len(), "primary values set");
    Ok(())
}

/// Pick one of `values`; `None` only when `values` is empty.
fn select_primary(
    values: &[String],
    freqs: &FrequencyTable,
    min_recent_count: u64,
) -> ReduceResult<Option<String>> {
    let mut recent_sum = 0u64;
    let mut recent_best: Option<(&str, u64)> = None;
    let mut total_best: Option<(&str, u64)> = None;

    for value in values {
        let freq = freqs.get(value).ok_or_else(|| ReduceError::MissingFrequency {
            value: value.clone(),
        })?;
        recent_sum += freq.recent;
        if freq.recent > 0 && recent_best.is_none_or(|(_, best)| freq.recent > best) {
            recent_best = Some((value, freq.recent));
        }
        if freq.total > 0 && total_best.is_none_or(|(_, best)| freq.total > best) {
            total_best = Some((value, freq.total));
        }
    }

    let first = values.first().map(String::as_str);
    let total = total_best.map(|(v, _)| v).or(first);
    let chosen = if recent_sum >= min_recent_count {
        recent_best.map(|(v, _)| v).or(total)
    } else {
        total
    };
    Ok(chosen.map(str::to_string))
}
