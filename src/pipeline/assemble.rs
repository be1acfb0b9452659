//! Merges summaries with their enrichment into output records.

use std::collections::HashMap;

use tracing::warn;

use crate::core::types::{DetailEnrichment, ItemSummary, Record};

pub struct RecordAssembler;

impl RecordAssembler {
    /// Positional merge: the i-th enrichment belongs to the i-th summary.
    /// Missing or absent enrichments become sentinel. Output order and length
    /// always match `summaries`; surplus enrichments are dropped.
    pub fn assemble<I>(summaries: Vec<ItemSummary>, enrichments: I) -> Vec<Record>
    where
        I: IntoIterator<Item = Option<DetailEnrichment>>,
    {
        let mut enrichments = enrichments.into_iter();
        let records: Vec<Record> = summaries
            .into_iter()
            .map(|summary| Record {
                summary,
                enrichment: enrichments
                    .next()
                    .flatten()
                    .unwrap_or_else(DetailEnrichment::sentinel),
            })
            .collect();

        let surplus = enrichments.count();
        if surplus > 0 {
            warn!("{} enrichments had no matching summary", surplus);
        }
        records
    }

    /// Keyed merge by detail URL, for enrichments produced out of order.
    /// Summaries without a detail URL, or without a matching entry, get the
    /// sentinel enrichment.
    pub fn assemble_keyed(
        summaries: Vec<ItemSummary>,
        mut enrichments: HashMap<String, DetailEnrichment>,
    ) -> Vec<Record> {
        summaries
            .into_iter()
            .map(|summary| {
                let enrichment = if summary.detail_url.is_empty() {
                    None
                } else {
                    enrichments.remove(&summary.detail_url)
                };
                Record {
                    summary,
                    enrichment: enrichment.unwrap_or_else(DetailEnrichment::sentinel),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Credit;

    fn summary(title: &str, url: &str) -> ItemSummary {
        ItemSummary {
            title: title.into(),
            detail_url: url.into(),
            ..Default::default()
        }
    }

    fn enriched(name: &str) -> DetailEnrichment {
        let mut e = DetailEnrichment::sentinel();
        e.description = format!("about {name}");
        e.songwriters = vec![Credit {
            image_url: String::new(),
            name: name.into(),
            role: "Composer".into(),
        }];
        e
    }

    #[test]
    fn length_matches_summaries_for_any_mix_of_failures() {
        let summaries = vec![
            summary("A", "https://vinyl.com/products/a"),
            summary("B", "https://vinyl.com/products/b"),
            summary("C", ""),
        ];

        let all_failed = RecordAssembler::assemble(summaries.clone(), vec![None, None, None]);
        assert_eq!(all_failed.len(), 3);
        assert!(all_failed.iter().all(|r| r.enrichment.is_sentinel()));

        let none_given = RecordAssembler::assemble(summaries.clone(), Vec::new());
        assert_eq!(none_given.len(), 3);

        let mixed = RecordAssembler::assemble(summaries, vec![Some(enriched("x")), None]);
        assert_eq!(mixed.len(), 3);
        assert_eq!(mixed[0].enrichment.description, "about x");
        assert!(mixed[1].enrichment.is_sentinel());
        assert!(mixed[2].enrichment.is_sentinel());
    }

    #[test]
    fn order_is_preserved_including_duplicate_titles() {
        let summaries = vec![
            summary("Greatest Hits", "https://vinyl.com/products/1"),
            summary("Greatest Hits", "https://vinyl.com/products/2"),
        ];
        let records = RecordAssembler::assemble(
            summaries,
            vec![Some(enriched("first")), Some(enriched("second"))],
        );
        assert_eq!(records[0].summary.detail_url, "https://vinyl.com/products/1");
        assert_eq!(records[1].enrichment.description, "about second");
    }

    #[test]
    fn keyed_merge_matches_by_detail_url() {
        let summaries = vec![
            summary("A", "https://vinyl.com/products/a"),
            summary("B", ""),
            summary("C", "https://vinyl.com/products/c"),
        ];
        let mut by_url = HashMap::new();
        by_url.insert("https://vinyl.com/products/c".to_string(), enriched("c"));
        by_url.insert("https://vinyl.com/products/zzz".to_string(), enriched("zzz"));

        let records = RecordAssembler::assemble_keyed(summaries, by_url);
        assert_eq!(records.len(), 3);
        assert!(records[0].enrichment.is_sentinel());
        assert!(records[1].enrichment.is_sentinel());
        assert_eq!(records[2].enrichment.description, "about c");
    }
}
