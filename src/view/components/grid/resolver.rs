//! Track sizing for [`Grid`](super::Grid): definition validation, span
//! distribution and star resolution.

use tracing::warn;

use super::cells::CellUnitTypes;
use super::definitions::TrackDefinition;
use crate::error::LayoutError;
use crate::style::{GridUnitType, layout_round};

pub(crate) const REAL_EPSILON: f32 = f32::EPSILON;
/// Upper bound for star weights so their sum cannot overflow.
pub(crate) const STAR_VALUE_MAX: f32 = 1e30;

fn round_with(value: f32, scale: Option<f32>) -> f32 {
    scale.map_or(value, |scale| layout_round(value, scale))
}

fn is_user_auto(definition: &TrackDefinition) -> bool {
    definition.user_unit == GridUnitType::Auto
}

/// Pixel sizes must be finite and non-negative. Star weights too, and a
/// zero weight is only legal next to other tracks.
fn length_in_domain(definition: &TrackDefinition, track_count: usize) -> bool {
    let value = definition.length.value;
    match definition.length.unit {
        GridUnitType::Auto => true,
        GridUnitType::Pixel => value.is_finite() && value >= 0.0,
        GridUnitType::Star => value.is_finite() && value >= 0.0 && (value > 0.0 || track_count > 1),
    }
}

/// Resets the per-pass state of every definition. Out-of-domain lengths
/// fall back to Auto. Star tracks are demoted to Auto when
/// `treat_star_as_auto` is set, which happens when the axis is unbounded.
pub(crate) fn validate_definitions(
    definitions: &mut [TrackDefinition],
    treat_star_as_auto: bool,
    scale: Option<f32>,
) {
    let track_count = definitions.len();
    for definition in definitions {
        let valid = length_in_domain(definition, track_count);
        if !valid && !definition.invalid_length {
            let err = LayoutError::invalid_track_length(format!("{:?}", definition.length));
            warn!(%err, "falling back to Auto track");
        }
        definition.invalid_length = !valid;
        definition.user_unit = if valid {
            definition.length.unit
        } else {
            GridUnitType::Auto
        };

        let mut user_size = f32::INFINITY;
        let mut user_min = round_with(definition.user_min(), scale);
        let user_max = round_with(definition.user_max(), scale);

        definition.effective_unit = match definition.user_unit {
            GridUnitType::Pixel => {
                user_size = round_with(definition.length.value, scale);
                user_min = user_min.max(user_size.min(user_max));
                GridUnitType::Pixel
            }
            GridUnitType::Auto => GridUnitType::Auto,
            GridUnitType::Star if treat_star_as_auto => GridUnitType::Auto,
            GridUnitType::Star => GridUnitType::Star,
        };
        definition.effective_min = user_min;
        definition.measure_arrange_size = user_min.max(user_size.min(user_max));
    }
}

pub(crate) fn length_type_for_range(
    definitions: &[TrackDefinition],
    start: usize,
    count: usize,
) -> CellUnitTypes {
    definitions[start..start + count]
        .iter()
        .fold(CellUnitTypes::empty(), |types, definition| {
            types
                | match definition.effective_unit {
                    GridUnitType::Auto => CellUnitTypes::AUTO,
                    GridUnitType::Pixel => CellUnitTypes::PIXEL,
                    GridUnitType::Star => CellUnitTypes::STAR,
                }
        })
}

pub(crate) fn available_size_for_range(
    definitions: &[TrackDefinition],
    start: usize,
    count: usize,
    spacing: f32,
) -> f32 {
    let sum: f32 = definitions[start..start + count]
        .iter()
        .map(|definition| match definition.effective_unit {
            GridUnitType::Auto => definition.effective_min,
            _ => definition.measure_arrange_size,
        })
        .sum();
    sum + spacing * count.saturating_sub(1) as f32
}

pub(crate) fn final_size_for_range(
    definitions: &[TrackDefinition],
    start: usize,
    count: usize,
    spacing: f32,
) -> f32 {
    let sum: f32 = definitions[start..start + count]
        .iter()
        .map(|definition| definition.measure_arrange_size)
        .sum();
    sum + spacing * count.saturating_sub(1) as f32
}

pub(crate) fn desired_inner_size(definitions: &[TrackDefinition]) -> f32 {
    definitions
        .iter()
        .map(|definition| definition.effective_min)
        .sum()
}

/// A spanning child's desired size, collected while a cell group is
/// measured and distributed once the whole group is done.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct SpanEntry {
    pub start: usize,
    pub count: usize,
    pub desired: f32,
    pub is_column: bool,
}

pub(crate) fn register_span(
    spans: &mut Vec<SpanEntry>,
    start: usize,
    count: usize,
    desired: f32,
    is_column: bool,
) {
    if let Some(entry) = spans
        .iter_mut()
        .find(|entry| entry.is_column == is_column && entry.start == start && entry.count == count)
    {
        entry.desired = entry.desired.max(desired);
    } else {
        spans.push(SpanEntry {
            start,
            count,
            desired,
            is_column,
        });
    }
}

/// Grows the effective minimums of `count` definitions from `start` so they
/// hold `desired` plus nothing of the inner spacing.
pub(crate) fn ensure_min_size_in_definition_range(
    definitions: &mut [TrackDefinition],
    start: usize,
    count: usize,
    spacing: f32,
    desired: f32,
) {
    let requested = (desired - spacing * count.saturating_sub(1) as f32).max(0.0);
    if requested <= REAL_EPSILON || count == 0 {
        return;
    }

    let end = start + count;
    let mut auto_count = 0usize;
    let mut range_min = 0.0_f32;
    let mut range_preferred = 0.0_f32;
    let mut range_max = 0.0_f32;
    let mut max_max = 0.0_f32;

    for definition in &mut definitions[start..end] {
        let effective_min = definition.effective_min;
        let max_size = definition.user_max().max(effective_min);
        range_min += effective_min;
        range_preferred += definition.preferred_size();
        range_max += max_size;
        definition.size_cache = max_size;
        max_max = max_max.max(max_size);
        if is_user_auto(definition) {
            auto_count += 1;
        }
    }

    let mut order: Vec<usize> = (start..end).collect();

    if requested <= range_min {
        return;
    }

    if requested <= range_preferred {
        // Auto tracks stay tight; the rest grow toward their preferred size,
        // smallest first.
        order.sort_by(|&a, &b| {
            let (a, b) = (&definitions[a], &definitions[b]);
            match (is_user_auto(a), is_user_auto(b)) {
                (true, false) => std::cmp::Ordering::Less,
                (false, true) => std::cmp::Ordering::Greater,
                (true, true) => a.effective_min.total_cmp(&b.effective_min),
                (false, false) => a.preferred_size().total_cmp(&b.preferred_size()),
            }
        });

        let mut to_distribute = requested;
        for &index in &order[..auto_count] {
            to_distribute -= definitions[index].effective_min;
        }
        for (k, &index) in order.iter().enumerate().skip(auto_count) {
            let definition = &mut definitions[index];
            let new_min = (to_distribute / (count - k) as f32).min(definition.preferred_size());
            definition.update_effective_min(new_min);
            to_distribute -= new_min;
            if to_distribute < REAL_EPSILON {
                break;
            }
        }
    } else if requested <= range_max {
        // Grow toward max sizes, non-Auto tracks first.
        order.sort_by(|&a, &b| {
            let (a, b) = (&definitions[a], &definitions[b]);
            match (is_user_auto(a), is_user_auto(b)) {
                (false, true) => std::cmp::Ordering::Less,
                (true, false) => std::cmp::Ordering::Greater,
                _ => a.size_cache.total_cmp(&b.size_cache),
            }
        });

        let mut to_distribute = requested - range_preferred;
        let non_auto_count = count - auto_count;
        for (k, &index) in order.iter().enumerate() {
            let definition = &mut definitions[index];
            let preferred = definition.preferred_size();
            let share = if k < non_auto_count {
                to_distribute / (non_auto_count - k) as f32
            } else {
                to_distribute / (count - k) as f32
            };
            let new_min = (preferred + share).min(definition.size_cache);
            definition.update_effective_min(new_min);
            to_distribute -= definition.effective_min - preferred;
            if to_distribute < REAL_EPSILON {
                break;
            }
        }
    } else {
        let equal_share = requested / count as f32;
        if equal_share < max_max && (max_max - equal_share) > REAL_EPSILON {
            // Smaller tracks grow faster so the range evens out.
            let total_remaining = max_max * count as f32 - range_max;
            let to_distribute = requested - range_max;
            for &index in &order {
                let definition = &mut definitions[index];
                let delta = (max_max - definition.size_cache) * to_distribute / total_remaining;
                let grown = definition.size_cache + delta;
                definition.update_effective_min(grown);
            }
        } else {
            for &index in &order {
                definitions[index].update_effective_min(equal_share);
            }
        }
    }
}

/// Stores the normalized weight in `measure_arrange_size` and the
/// max-to-weight ratio in `size_cache`, ready for distribution.
fn prepare_star(definition: &mut TrackDefinition) {
    let weight = definition.length.value;
    if weight.is_nan() || weight < REAL_EPSILON {
        definition.measure_arrange_size = 0.0;
        definition.size_cache = 0.0;
    } else {
        let weight = weight.min(STAR_VALUE_MAX);
        definition.measure_arrange_size = weight;
        let max_size = STAR_VALUE_MAX.min(definition.effective_min.max(definition.user_max()));
        definition.size_cache = max_size / weight;
    }
}

/// Resolves the star tracks of one axis during measure.
pub(crate) fn resolve_star(definitions: &mut [TrackDefinition], available: f32, scale: Option<f32>) {
    let mut stars = Vec::new();
    let mut taken = 0.0_f32;
    for (index, definition) in definitions.iter_mut().enumerate() {
        match definition.effective_unit {
            GridUnitType::Star => {
                prepare_star(definition);
                stars.push(index);
            }
            GridUnitType::Pixel => taken += definition.measure_arrange_size,
            GridUnitType::Auto => taken += definition.effective_min,
        }
    }

    let mut available = available;
    if let Some(scale) = scale {
        taken = layout_round(taken, scale);
        available = layout_round(available, scale);
    }
    distribute_star_space(definitions, &mut stars, available - taken, scale);
}

/// Splits `available` among `stars` by weight. Tracks with the smallest
/// max-to-weight ratio are served first so that capped tracks hand their
/// leftover to the rest. Returns the total handed out.
pub(crate) fn distribute_star_space(
    definitions: &mut [TrackDefinition],
    stars: &mut [usize],
    available: f32,
    scale: Option<f32>,
) -> f32 {
    stars.sort_by(|&a, &b| definitions[a].size_cache.total_cmp(&definitions[b].size_cache));

    let mut remaining_weight = 0.0_f32;
    for &index in stars.iter().rev() {
        remaining_weight += definitions[index].measure_arrange_size;
        definitions[index].size_cache = remaining_weight;
    }

    let mut total = 0.0_f32;
    for &index in stars.iter() {
        let definition = &mut definitions[index];
        let weight = definition.measure_arrange_size;
        let mut resolved = if weight == 0.0 {
            definition.effective_min
        } else {
            ((available - total).max(0.0) * (weight / definition.size_cache))
                .min(definition.user_max())
                .max(definition.effective_min)
        };
        resolved = round_with(resolved, scale);
        definition.measure_arrange_size = resolved;
        total += resolved;
    }
    total
}

/// Computes final sizes and offsets of one axis for arrange.
pub(crate) fn set_final_size(definitions: &mut [TrackDefinition], final_size: f32, scale: Option<f32>) {
    let mut stars = Vec::new();
    let mut non_stars = Vec::new();
    let mut all_preferred = 0.0_f32;

    for (index, definition) in definitions.iter_mut().enumerate() {
        if definition.user_unit == GridUnitType::Star {
            prepare_star(definition);
            stars.push(index);
            continue;
        }
        let user_max = round_with(definition.user_max(), scale);
        let user_size = match definition.user_unit {
            GridUnitType::Pixel => round_with(definition.length.value, scale),
            _ => definition.effective_min,
        };
        definition.measure_arrange_size = definition.effective_min.max(user_size.min(user_max));
        all_preferred += definition.measure_arrange_size;
        non_stars.push(index);
    }

    all_preferred += distribute_star_space(definitions, &mut stars, final_size - all_preferred, scale);

    if all_preferred > final_size && (all_preferred - final_size).abs() > REAL_EPSILON {
        // Take the overflow back from the tracks with the most room above
        // their minimum.
        let mut order = stars;
        order.extend(non_stars.iter().rev());
        order.sort_by(|&a, &b| {
            let slack = |index: usize| {
                definitions[index].measure_arrange_size - definitions[index].effective_min
            };
            slack(a).total_cmp(&slack(b))
        });

        let count = order.len();
        let mut to_distribute = final_size - all_preferred;
        for (k, &index) in order.iter().enumerate() {
            let definition = &mut definitions[index];
            let current = definition.measure_arrange_size;
            let adjusted = (current + to_distribute / (count - k) as f32)
                .max(definition.effective_min)
                .min(current);
            to_distribute -= adjusted - current;
            definition.measure_arrange_size = adjusted;
        }
    }

    let mut offset = 0.0_f32;
    for definition in definitions.iter_mut() {
        definition.final_offset = offset;
        offset += definition.measure_arrange_size;
    }
}
