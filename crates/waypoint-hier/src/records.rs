use waypoint_core::types::{Record, TITLE_KEY};
use waypoint_core::Corpus;

/// One metadata-free record per title, in corpus order.
pub fn title_records(corpus: &Corpus) -> Vec<Record> {
    corpus.titles().map(Record::new).collect()
}

/// Every chunk, tagged with its owning title.
pub fn chunk_records(corpus: &Corpus) -> Vec<Record> {
    corpus
        .iter()
        .flat_map(|(title, chunks)| chunks.iter().map(move |c| Record::new(c.as_str()).with_meta(TITLE_KEY, title)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_records_carry_their_title() {
        let corpus = Corpus::from_sections(
            [("Rome: History", vec!["Rome was founded in 753 BC"]), ("Paris: History", vec!["Lutetia", "Capetians"]), ("Empty", vec![])],
            2000,
        )
        .unwrap();

        let titles: Vec<String> = title_records(&corpus).into_iter().map(|r| r.text).collect();
        assert_eq!(titles, vec!["Paris: History", "Rome: History"]);
        assert!(title_records(&corpus).iter().all(|r| r.meta.is_empty()));

        let chunks = chunk_records(&corpus);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text, "Lutetia");
        assert_eq!(chunks[0].meta.get(TITLE_KEY).map(String::as_str), Some("Paris: History"));
        assert_eq!(chunks[2].meta.get(TITLE_KEY).map(String::as_str), Some("Rome: History"));
    }
}
