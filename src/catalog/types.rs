use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct Tag {
    pub name: String,
    #[serde(default)]
    pub count: u64,
}

/// One entry of a subject search.
#[derive(Debug, Clone, Deserialize)]
pub struct SubjectSummary {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub name_cn: Option<String>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

impl SubjectSummary {
    /// Localized name when the catalog has one, otherwise the original.
    pub fn display_name(&self) -> &str {
        display_name(&self.name, self.name_cn.as_deref())
    }

    pub fn is_manga(&self) -> bool {
        self.tags.iter().any(|t| t.name.contains(MANGA_TAG))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub data: Vec<SubjectSummary>,
    #[serde(default)]
    pub total: u64,
}

/// Canonical record of a subject; `id` may differ from the requested one.
#[derive(Debug, Clone, Deserialize)]
pub struct Subject {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub name_cn: Option<String>,
}

impl Subject {
    pub fn display_name(&self) -> &str {
        display_name(&self.name, self.name_cn.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelatedPerson {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub relation: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SearchRequest<'a> {
    pub keyword: &'a str,
    pub sort: &'static str,
    pub filter: SearchFilter,
}

#[derive(Debug, Serialize)]
pub struct SearchFilter {
    #[serde(rename = "type")]
    pub kind: Vec<u8>,
    pub tag: Vec<String>,
    pub air_date: Vec<String>,
    pub rating: Vec<String>,
}

impl<'a> SearchRequest<'a> {
    /// Match-sorted search restricted to books.
    pub fn novels(keyword: &'a str) -> Self {
        Self {
            keyword,
            sort: "match",
            filter: SearchFilter {
                kind: vec![SUBJECT_TYPE_BOOK],
                tag: Vec::new(),
                air_date: Vec::new(),
                rating: Vec::new(),
            },
        }
    }
}

pub const SUBJECT_TYPE_BOOK: u8 = 1;
pub const MANGA_TAG: &str = "漫画";
pub const ROLE_AUTHOR: &str = "作者";
pub const ROLE_ILLUSTRATOR: &str = "插图";
pub const ROLE_PUBLISHER: &str = "出版社";

/// `{id, name}` pair the search and identity-correction steps hand back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectRef {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Person {
    pub id: u64,
    pub name: String,
}

impl Person {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// `name[id]`, the token used in directory names.
    pub fn token(&self) -> String {
        format!("{}[{}]", self.name, self.id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Persons {
    pub authors: Vec<Person>,
    pub illustrators: Vec<Person>,
    pub producers: Vec<Person>,
}

impl Persons {
    /// Buckets relation records by role; unknown roles are dropped.
    pub fn from_relations<I>(relations: I) -> Self
    where
        I: IntoIterator<Item = RelatedPerson>,
    {
        let mut persons = Self::default();
        for rel in relations {
            let bucket = match rel.relation.as_deref() {
                Some(ROLE_AUTHOR) => &mut persons.authors,
                Some(ROLE_ILLUSTRATOR) => &mut persons.illustrators,
                Some(ROLE_PUBLISHER) => &mut persons.producers,
                _ => continue,
            };
            bucket.push(Person::new(rel.id, rel.name));
        }
        persons
    }
}

fn display_name<'a>(name: &'a str, name_cn: Option<&'a str>) -> &'a str {
    match name_cn {
        Some(cn) if !cn.trim().is_empty() => cn,
        _ => name,
    }
}
