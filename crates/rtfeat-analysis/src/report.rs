//! Plain-text rendering of rollups and comparisons
//!
//! Output is indented by level with tabs, and every RT value is printed with six
//! significant digits followed by `ms`:
//!
//! ```text
//! Subject: S01
//! 	Run 1:
//! 		mean: 312.5 ms
//! 		median: 310 ms
//! ```
//!
//! All writers target [`fmt::Write`], so callers choose between a `String`
//! buffer and an adapter over stdout.

use std::{
    collections::BTreeMap,
    fmt::{self, Write},
};

use crate::{
    comparison::{ConditionCorrelation, FieldComparison},
    dataset::ConditionCode,
    rollup::{Features, LevelFeatures},
    summary::{Summary, SummaryField},
};

/// Formats `value` with six significant digits, like C's `%.6g`.
///
/// # Examples
///
/// ```
/// use rtfeat_analysis::report::significant;
///
/// assert_eq!(significant(312.5), "312.5");
/// assert_eq!(significant(81.649658), "81.6497");
/// assert_eq!(significant(1_234_567.0), "1.23457e+06");
/// assert_eq!(significant(f64::NAN), "nan");
/// ```
#[must_use]
pub fn significant(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_owned();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_owned();
    }
    if value == 0.0 {
        return "0".to_owned();
    }

    let scientific = format!("{value:.5e}");
    let Some((mantissa, exponent)) = scientific
        .split_once('e')
        .and_then(|(m, e)| Some((m, e.parse::<i32>().ok()?)))
    else {
        return scientific;
    };

    if (-4..6).contains(&exponent) {
        let decimals = usize::try_from(5 - exponent).unwrap_or(0);
        trim_fraction(&format!("{value:.decimals$}")).to_owned()
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{sign}{:02}", trim_fraction(mantissa), exponent.abs())
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

fn write_summary<W>(out: &mut W, summary: &Summary, indent: &str) -> fmt::Result
where
    W: Write,
{
    for field in SummaryField::ALL {
        writeln!(out, "{indent}{field}: {} ms", significant(summary.get(field)))?;
    }
    Ok(())
}

fn write_by_condition<W>(out: &mut W, level: &LevelFeatures, indent: &str) -> fmt::Result
where
    W: Write,
{
    for (code, group) in &level.by_condition {
        writeln!(out, "{indent}Condition {code}:")?;
        let inner = format!("{indent}\t");
        write_summary(out, &group.summary, &inner)?;
        writeln!(out, "{inner}normality: {}", group.normality)?;
    }
    Ok(())
}

/// Ungrouped features of every run.
pub fn write_run_features<W>(out: &mut W, features: &Features) -> fmt::Result
where
    W: Write,
{
    for (subject, runs) in features.run_features() {
        writeln!(out, "Subject: {subject}")?;
        for (run, level) in runs {
            writeln!(out, "\tRun {run}:")?;
            write_summary(out, &level.summary, "\t\t")?;
        }
    }
    Ok(())
}

/// Per-condition features of every run.
pub fn write_run_features_by_condition<W>(out: &mut W, features: &Features) -> fmt::Result
where
    W: Write,
{
    for (subject, runs) in features.run_features() {
        writeln!(out, "Subject: {subject}")?;
        for (run, level) in runs {
            writeln!(out, "\tRun {run}:")?;
            write_by_condition(out, level, "\t\t")?;
        }
    }
    Ok(())
}

/// Ungrouped features of every subject.
pub fn write_subject_features<W>(out: &mut W, features: &Features) -> fmt::Result
where
    W: Write,
{
    for (subject, level) in features.subject_features() {
        writeln!(out, "Subject: {subject}")?;
        write_summary(out, &level.summary, "\t")?;
    }
    Ok(())
}

/// Per-condition features of every subject.
pub fn write_subject_features_by_condition<W>(out: &mut W, features: &Features) -> fmt::Result
where
    W: Write,
{
    for (subject, level) in features.subject_features() {
        writeln!(out, "Subject: {subject}")?;
        write_by_condition(out, level, "\t")?;
    }
    Ok(())
}

/// Ungrouped and per-condition features of the whole dataset.
pub fn write_overall_features<W>(out: &mut W, features: &Features) -> fmt::Result
where
    W: Write,
{
    let Some(overall) = features.overall() else {
        return Ok(());
    };
    writeln!(out, "Overall:")?;
    write_summary(out, &overall.summary, "\t")?;
    write_by_condition(out, overall, "\t")
}

/// Heterotopic/homotopic ratios of every run, subject and the whole dataset.
pub fn write_ratios<W>(out: &mut W, features: &Features) -> fmt::Result
where
    W: Write,
{
    for (subject, runs) in features.run_features() {
        writeln!(out, "Subject: {subject}")?;
        for (run, level) in runs {
            writeln!(out, "\tRun {run}: {}", significant(level.ratio))?;
        }
        if let Some(level) = features.subject(subject) {
            writeln!(out, "\tAll runs: {}", significant(level.ratio))?;
        }
    }
    if let Some(overall) = features.overall() {
        writeln!(out, "Overall: {}", significant(overall.ratio))?;
    }
    Ok(())
}

/// Per-condition correlation results of one cell.
pub fn write_correlations<W>(
    out: &mut W,
    correlations: &BTreeMap<ConditionCode, ConditionCorrelation>,
) -> fmt::Result
where
    W: Write,
{
    for (code, correlation) in correlations {
        match *correlation {
            ConditionCorrelation::NoData {
                missing_a,
                missing_b,
            } => writeln!(
                out,
                "Condition {code}: no data ({missing_a} missing in A, {missing_b} missing in B)"
            )?,
            ConditionCorrelation::Computed {
                n_pairs,
                missing_a,
                missing_b,
                r,
                p_value,
                significance,
            } => writeln!(
                out,
                "Condition {code}: r = {}, p = {} ({significance}), {n_pairs} pairs, \
                 {missing_a} missing in A, {missing_b} missing in B",
                significant(r),
                significant(p_value),
            )?,
        }
    }
    Ok(())
}

/// One line per scalar comparison row.
pub fn write_comparisons<W>(out: &mut W, rows: &[FieldComparison]) -> fmt::Result
where
    W: Write,
{
    for row in rows {
        write!(out, "{}", row.scope)?;
        if let Some(code) = row.condition {
            write!(out, ", condition {code}")?;
        }
        write!(
            out,
            ", {}: A = {} ms, B = {} ms",
            row.field,
            significant(row.a),
            significant(row.b)
        )?;
        if let Some(diff) = row.difference {
            write!(
                out,
                ", diff = {} ms ({}%)",
                significant(diff.absolute),
                significant(diff.percent)
            )?;
        }
        writeln!(out)?;
    }
    Ok(())
}
