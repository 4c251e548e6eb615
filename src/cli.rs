//! Non-interactive commands printing to a writer.

use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::controller::{fetch_snapshot, upload_file, validate_csv_path};
use crate::derive::{self, Card, CardValue, SummaryCards};
use crate::format::{format_coordinates, format_currency, format_number, truncate_text};
use crate::models::{AggregationRecord, Receipt};
use crate::service::CrimeApi;

const NAME_WIDTH: usize = 32;

/// Ranked neighborhoods, optionally filtered and limited.
pub async fn list(api: &dyn CrimeApi, out: &mut impl Write, search: Option<&str>, limit: Option<usize>) -> Result<()> {
    let records = api.get_aggregations().await.context("fetching aggregations")?;
    let mut ranked = derive::filter_by_search(&records, search.unwrap_or_default());
    if let Some(limit) = limit {
        ranked.truncate(limit);
    }

    if ranked.is_empty() {
        writeln!(out, "No information available.")?;
        return Ok(());
    }

    writeln!(
        out,
        "{:>4}  {:<NAME_WIDTH$}  {:>10}  {:>16}  {}",
        "#", "Bairro", "Crimes", "Loss", "Coordinates"
    )?;
    for (idx, record) in ranked.iter().enumerate() {
        writeln!(
            out,
            "{:>4}  {:<NAME_WIDTH$}  {:>10}  {:>16}  {}",
            idx + 1,
            truncate_text(&record.bairro, NAME_WIDTH),
            format_number(record.total_crimes),
            format_currency(record.prejuizo_total),
            format_coordinates(record.coordinates()),
        )?;
    }
    Ok(())
}

/// The four summary cards plus the top neighborhoods.
pub async fn stats(api: &dyn CrimeApi, out: &mut impl Write) -> Result<()> {
    let snapshot = fetch_snapshot(api).await.context("fetching dashboard data")?;
    let cards = SummaryCards::from_stats(snapshot.stats.as_ref());
    for card in cards.cards() {
        print_card(out, card)?;
    }

    let top = derive::top_bairros(&snapshot.aggregations, derive::TOP_N);
    if !top.is_empty() {
        writeln!(out)?;
        writeln!(out, "Highest incidence:")?;
        for (idx, record) in top.iter().enumerate() {
            writeln!(out, "  #{} {} ({})", idx + 1, record.bairro, format_number(record.total_crimes))?;
        }
    }
    Ok(())
}

/// One neighborhood, looked up by name.
pub async fn show(api: &dyn CrimeApi, out: &mut impl Write, bairro: &str) -> Result<()> {
    let record = api
        .get_aggregation_by_bairro(bairro)
        .await
        .with_context(|| format!("looking up {bairro}"))?;
    print_record(out, &record)
}

/// Uploads a CSV file, then prints the refreshed totals.
pub async fn upload(api: &dyn CrimeApi, out: &mut impl Write, file: &Path) -> Result<()> {
    validate_csv_path(file)?;
    let receipt = upload_file(api, file)
        .await
        .with_context(|| format!("uploading {}", file.display()))?;
    print_receipt(out, &receipt, "File uploaded! Processing new data...")?;

    writeln!(out)?;
    stats(api, out).await
}

/// Deletes all aggregated data. Refuses without `confirmed`.
pub async fn clear(api: &dyn CrimeApi, out: &mut impl Write, confirmed: bool) -> Result<()> {
    if !confirmed {
        bail!("refusing to delete all data without --yes");
    }
    let receipt = api.clear_data().await.context("clearing data")?;
    print_receipt(out, &receipt, "All data cleared.")
}

pub async fn health(api: &dyn CrimeApi, out: &mut impl Write) -> Result<()> {
    let status = api.health().await.context("checking API health")?;
    match status.timestamp {
        Some(ts) => writeln!(out, "{} ({ts})", status.status)?,
        None => writeln!(out, "{}", status.status)?,
    }
    Ok(())
}

fn card_text(value: &CardValue) -> String {
    match value {
        CardValue::Count(n) => format_number(*n),
        CardValue::Money(amount) => format_currency(*amount),
        CardValue::Name(name) => name.clone(),
    }
}

fn print_card(out: &mut impl Write, card: &Card) -> Result<()> {
    let value = card.value.as_ref().map_or_else(|| "--".to_string(), card_text);
    write!(out, "{:<20} {value}", card.label)?;
    if let Some((label, secondary)) = &card.secondary {
        write!(out, "  ({label}: {})", card_text(secondary))?;
    }
    writeln!(out)?;
    Ok(())
}

fn print_record(out: &mut impl Write, record: &AggregationRecord) -> Result<()> {
    writeln!(out, "{}", record.bairro)?;
    writeln!(out, "  Crimes:      {}", format_number(record.total_crimes))?;
    writeln!(out, "  Loss:        {}", format_currency(record.prejuizo_total))?;
    writeln!(out, "  Coordinates: {}", format_coordinates(record.coordinates()))?;
    Ok(())
}

fn print_receipt(out: &mut impl Write, receipt: &Receipt, fallback: &str) -> Result<()> {
    writeln!(out, "{}", receipt.mensagem.as_deref().unwrap_or(fallback))?;
    if let Some(rows) = receipt.rows_processed {
        writeln!(out, "Rows processed: {}", format_number(rows))?;
    }
    for error in &receipt.errors {
        writeln!(out, "  warning: {error}")?;
    }
    Ok(())
}
