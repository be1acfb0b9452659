//! Flat-file output: one CSV row per record with a fixed column layout.
//!
//! Sequence-valued columns hold JSON arrays of arrays (`[["Label","Columbia"]]`)
//! so placeholder rows come back exactly as written.

use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::types::{Credit, DetailEnrichment, ItemSummary, Record, SpecRow, TrackRow};

/// Column order expected by downstream consumers.
pub const COLUMNS: [&str; 17] = [
    "image_url",
    "detail_url",
    "title",
    "artist",
    "price",
    "previous_price",
    "sale_label",
    "low_stock_label",
    "sold_out_label",
    "genre",
    "description",
    "spec_rows",
    "tracklist",
    "playlist_name",
    "primary_creators",
    "companies",
    "songwriters",
];

/// Field order of this struct is the column order.
#[derive(Debug, Serialize, Deserialize)]
struct Row {
    image_url: String,
    detail_url: String,
    title: String,
    artist: String,
    price: String,
    previous_price: String,
    sale_label: String,
    low_stock_label: String,
    sold_out_label: String,
    genre: String,
    description: String,
    spec_rows: String,
    tracklist: String,
    playlist_name: String,
    primary_creators: String,
    companies: String,
    songwriters: String,
}

fn credits_cell(credits: &[Credit]) -> Result<String> {
    let rows: Vec<[&str; 3]> = credits
        .iter()
        .map(|c| [c.image_url.as_str(), c.name.as_str(), c.role.as_str()])
        .collect();
    Ok(serde_json::to_string(&rows)?)
}

fn parse_credits_cell(cell: &str) -> Result<Vec<Credit>> {
    let rows: Vec<[String; 3]> = serde_json::from_str(cell)?;
    Ok(rows
        .into_iter()
        .map(|[image_url, name, role]| Credit {
            image_url,
            name,
            role,
        })
        .collect())
}

impl Row {
    fn from_record(record: &Record) -> Result<Self> {
        let s = &record.summary;
        let e = &record.enrichment;
        let spec_rows: Vec<[&str; 2]> = e
            .spec_rows
            .iter()
            .map(|r| [r.label.as_str(), r.value.as_str()])
            .collect();
        let tracklist: Vec<[&str; 3]> = e
            .tracklist
            .iter()
            .map(|t| [t.position.as_str(), t.title.as_str(), t.duration.as_str()])
            .collect();

        Ok(Self {
            image_url: s.image_url.clone(),
            detail_url: s.detail_url.clone(),
            title: s.title.clone(),
            artist: s.artist.clone(),
            price: s.price.clone(),
            previous_price: s.previous_price.clone(),
            sale_label: s.sale_label.clone(),
            low_stock_label: s.low_stock_label.clone(),
            sold_out_label: s.sold_out_label.clone(),
            genre: s.genre.clone(),
            description: e.description.clone(),
            spec_rows: serde_json::to_string(&spec_rows)?,
            tracklist: serde_json::to_string(&tracklist)?,
            playlist_name: e.playlist_name.clone(),
            primary_creators: credits_cell(&e.primary_creators)?,
            companies: credits_cell(&e.companies)?,
            songwriters: credits_cell(&e.songwriters)?,
        })
    }

    fn into_record(self) -> Result<Record> {
        let spec_rows: Vec<[String; 2]> =
            serde_json::from_str(&self.spec_rows).context("spec_rows column")?;
        let tracklist: Vec<[String; 3]> =
            serde_json::from_str(&self.tracklist).context("tracklist column")?;

        Ok(Record {
            summary: ItemSummary {
                image_url: self.image_url,
                detail_url: self.detail_url,
                title: self.title,
                artist: self.artist,
                price: self.price,
                previous_price: self.previous_price,
                sale_label: self.sale_label,
                low_stock_label: self.low_stock_label,
                sold_out_label: self.sold_out_label,
                genre: self.genre,
            },
            enrichment: DetailEnrichment {
                description: self.description,
                spec_rows: spec_rows
                    .into_iter()
                    .map(|[label, value]| SpecRow { label, value })
                    .collect(),
                playlist_name: self.playlist_name,
                tracklist: tracklist
                    .into_iter()
                    .map(|[position, title, duration]| TrackRow {
                        position,
                        title,
                        duration,
                    })
                    .collect(),
                primary_creators: parse_credits_cell(&self.primary_creators)
                    .context("primary_creators column")?,
                companies: parse_credits_cell(&self.companies).context("companies column")?,
                songwriters: parse_credits_cell(&self.songwriters)
                    .context("songwriters column")?,
            },
        })
    }
}

/// Write `records` with a header row. Zero records still produce the header.
pub fn write_records<W: Write>(writer: W, records: &[Record]) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
    wtr.write_record(COLUMNS)?;
    for record in records {
        wtr.serialize(Row::from_record(record)?)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_csv(path: &Path, records: &[Record]) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    write_records(file, records)?;
    info!("💾 {} records written to {}", records.len(), path.display());
    Ok(())
}

/// Parse rows written by [`write_records`].
pub fn read_records<R: Read>(reader: R) -> Result<Vec<Record>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let headers = rdr.headers()?.clone();
    if headers.iter().ne(COLUMNS.iter().copied()) {
        anyhow::bail!("unexpected CSV header: {:?}", headers);
    }
    rdr.deserialize::<Row>()
        .enumerate()
        .map(|(i, row)| {
            row.with_context(|| format!("CSV row {}", i + 1))?
                .into_record()
                .with_context(|| format!("CSV row {}", i + 1))
        })
        .collect()
}

pub fn read_csv(path: &Path) -> Result<Vec<Record>> {
    let file =
        std::fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    read_records(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blues_record() -> Record {
        let mut enrichment = DetailEnrichment::sentinel();
        enrichment.description = "Chicago blues, \"live\" at the Regal, 1964".into();
        enrichment.spec_rows = vec![SpecRow::parse_line("Label: ABC-Paramount")];
        enrichment.songwriters = vec![Credit {
            image_url: "/img/bb.jpg".into(),
            name: "B.B. King".into(),
            role: "Composer, Lyricist".into(),
        }];
        Record {
            summary: ItemSummary {
                detail_url: "https://vinyl.com/products/live-at-the-regal".into(),
                title: "Live at the Regal".into(),
                artist: "B.B. King".into(),
                price: "€27,99".into(),
                genre: "Blues".into(),
                ..Default::default()
            },
            enrichment,
        }
    }

    #[test]
    fn header_row_has_fixed_column_order() {
        let mut out = Vec::new();
        write_records(&mut out, &[]).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.trim_end(), COLUMNS.join(","));
    }

    #[test]
    fn sentinel_rows_survive_write_and_read() {
        let records = vec![
            Record {
                summary: ItemSummary::default(),
                enrichment: DetailEnrichment::sentinel(),
            },
            blues_record(),
        ];

        let mut out = Vec::new();
        write_records(&mut out, &records).unwrap();
        let text = String::from_utf8(out.clone()).unwrap();
        assert!(text.contains(r#"[[""N/A"",""N/A""]]"#), "{}", text);

        let back = read_records(out.as_slice()).unwrap();
        assert_eq!(back, records);
        assert!(back[0].enrichment.is_sentinel());
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vinyl_data.csv");

        write_csv(&path, &[blues_record()]).unwrap();
        let back = read_csv(&path).unwrap();

        assert_eq!(back.len(), 1);
        assert_eq!(back[0].enrichment.songwriters[0].role, "Composer, Lyricist");
        assert_eq!(back[0].key(), Some("https://vinyl.com/products/live-at-the-regal"));
    }

    #[test]
    fn foreign_header_is_rejected() {
        let err = read_records("title,price\nA,1\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("unexpected CSV header"));
    }
}
