use crate::book::BookRecord;
use crate::catalog::Person;
use std::path::{Path, PathBuf};

const INVALID_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
const WINDOWS_RESERVED: &[&str] = &[
    "con", "prn", "aux", "nul", "com1", "com2", "com3", "com4", "com5", "com6", "com7", "com8",
    "com9", "lpt1", "lpt2", "lpt3", "lpt4", "lpt5", "lpt6", "lpt7", "lpt8", "lpt9",
];
const BOOK_EXTENSION: &str = "epub";

/// One safe path component: no separators or reserved characters, never empty.
pub fn sanitize_component(value: &str) -> String {
    let cleaned: String = value
        .trim_matches(|ch: char| ch == '.' || ch.is_whitespace())
        .chars()
        .map(|ch| {
            if INVALID_FILENAME_CHARS.contains(&ch) || ch.is_control() {
                '_'
            } else {
                ch
            }
        })
        .collect();
    if cleaned.is_empty() {
        return "_".into();
    }
    if WINDOWS_RESERVED.contains(&cleaned.to_ascii_lowercase().as_str()) {
        return format!("_{cleaned}");
    }
    cleaned
}

/// Sorted `name[id]` tokens joined with `_`.
pub fn author_dir_name(authors: &[Person]) -> String {
    let mut tokens: Vec<String> = authors.iter().map(Person::token).collect();
    tokens.sort();
    tokens.join("_")
}

/// Where `book` lands under `output_root`:
///
/// * unresolved: `author/[series/]title.epub` from local metadata
/// * resolved, no catalog authors: `author/name[id]/title.epub`
/// * resolved: `authorTokens/name[id]/title.epub`
pub fn destination(book: &BookRecord, output_root: &Path) -> PathBuf {
    let mut path = output_root.to_path_buf();
    match book.resolution() {
        None => {
            path.push(sanitize_component(book.author()));
            if let Some(series) = book.series_name() {
                path.push(sanitize_component(series));
            }
        }
        Some(res) => {
            let author_dir = if res.persons.authors.is_empty() {
                book.author().to_string()
            } else {
                author_dir_name(&res.persons.authors)
            };
            path.push(sanitize_component(&author_dir));
            path.push(sanitize_component(&format!(
                "{}[{}]",
                res.subject.name, res.subject.id
            )));
        }
    }
    path.push(format!(
        "{}.{BOOK_EXTENSION}",
        sanitize_component(book.clean_title())
    ));
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::PackageMetadata;
    use crate::catalog::fake::FakeCatalog;
    use crate::catalog::CatalogClient;
    use crate::config::CatalogConfig;

    fn book(title: &str, author: &str) -> BookRecord {
        BookRecord::from_metadata(
            PathBuf::from("src.epub"),
            PackageMetadata {
                title: Some(title.into()),
                creator: Some(author.into()),
            },
        )
    }

    #[test]
    fn author_tokens_sort_lexicographically() {
        let authors = [Person::new(5, "Tanaka"), Person::new(3, "Sato")];
        assert_eq!(author_dir_name(&authors), "Sato[3]_Tanaka[5]");
    }

    #[test]
    fn unresolved_book_uses_local_metadata() {
        let out = Path::new("/out");
        assert_eq!(
            destination(&book("刀剑神域 第十卷", "川原砾"), out),
            Path::new("/out/川原砾/刀剑神域/刀剑神域 第十卷.epub")
        );
        assert_eq!(
            destination(&book("Standalone", "Someone"), out),
            Path::new("/out/Someone/Standalone.epub")
        );
    }

    #[test]
    fn resolved_book_paths() {
        let mut c = CatalogClient::new(
            FakeCatalog::default()
                .with_subject(1, "魔法科高校的劣等生", &[])
                .with_person(1, 5, "Tanaka", "作者")
                .with_person(1, 3, "Sato", "作者")
                .with_subject(2, "合集", &[]),
            &CatalogConfig::default(),
        );

        let mut b = book("魔法科高校的劣等生 3", "local");
        b.resolve_identity(&mut c).unwrap();
        assert_eq!(
            destination(&b, Path::new("/out")),
            Path::new("/out/Sato[3]_Tanaka[5]/魔法科高校的劣等生[1]/魔法科高校的劣等生 3.epub")
        );

        let mut b = book("合集", "local");
        b.resolve_identity(&mut c).unwrap();
        assert_eq!(
            destination(&b, Path::new("/out")),
            Path::new("/out/local/合集[2]/合集.epub")
        );
    }

    #[test]
    fn unsafe_characters_are_replaced() {
        assert_eq!(sanitize_component("a/b:c"), "a_b_c");
        assert_eq!(sanitize_component(" ..hidden. "), "hidden");
        assert_eq!(sanitize_component("..."), "_");
        assert_eq!(sanitize_component("CON"), "_CON");
    }
}
