use crate::data::CountryId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// What a partner label denotes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CountryKind {
    Country,
    /// Economic or political grouping ("European Union", "CIS", "World")
    Aggregate,
    /// Geographic region ("Asia", "Africa")
    Region,
}

impl CountryKind {
    /// Aggregates and regions overlap with countries and must not be summed with them
    pub fn is_meta(&self) -> bool {
        !matches!(self, CountryKind::Country)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalCountry {
    pub name: CountryId,
    pub kind: CountryKind,
    pub eu_member: bool,
    pub aliases: Vec<String>,
}

/// Raw label that matched no alias; the record keeps the label as its identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MappingWarning {
    pub label: String,
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("alias '{alias}' maps to both {first} and {second}")]
pub struct AliasConflict {
    pub alias: String,
    pub first: CountryId,
    pub second: CountryId,
}

/// Outcome of looking up one raw label
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub id: CountryId,
    pub kind: CountryKind,
    pub warning: Option<MappingWarning>,
}

/// Immutable alias table: every spelling of a country resolves to one identity
#[derive(Debug, Clone)]
pub struct CountryTable {
    countries: Vec<CanonicalCountry>,
    by_alias: HashMap<String, usize>,
    /// Aliases with their trailing parenthetical dropped, first registration wins
    by_stem: HashMap<String, usize>,
    by_name: HashMap<CountryId, usize>,
}

impl CountryTable {
    pub fn new(countries: Vec<CanonicalCountry>) -> Result<Self, AliasConflict> {
        let mut table = Self {
            countries: Vec::with_capacity(countries.len()),
            by_alias: HashMap::new(),
            by_stem: HashMap::new(),
            by_name: HashMap::new(),
        };
        for country in countries {
            table.insert(country)?;
        }
        Ok(table)
    }

    /// Built-in table covering the Eurostat, Central Asian and Caucasus spellings
    pub fn with_defaults() -> Self {
        let mut table = Self {
            countries: Vec::new(),
            by_alias: HashMap::new(),
            by_stem: HashMap::new(),
            by_name: HashMap::new(),
        };
        for country in default_countries() {
            // the built-in rows never overlap, see test_default_rows_have_no_conflicts
            if let Err(conflict) = table.insert(country) {
                tracing::warn!("{}", conflict);
            }
        }
        table
    }

    /// Add extra `alias -> canonical name` pairs, creating plain countries for unknown names
    pub fn extend(&mut self, aliases: &BTreeMap<String, String>) -> Result<(), AliasConflict> {
        for (alias, canonical) in aliases {
            let id = CountryId::new(canonical.trim());
            let idx = match self.by_name.get(&id) {
                Some(&idx) => idx,
                None => {
                    self.insert(CanonicalCountry {
                        name: id.clone(),
                        kind: CountryKind::Country,
                        eu_member: false,
                        aliases: Vec::new(),
                    })?;
                    self.countries.len() - 1
                }
            };
            self.add_alias(alias, idx)?;
            self.countries[idx].aliases.push(alias.clone());
        }
        Ok(())
    }

    /// Look up a raw label.
    ///
    /// A trailing parenthetical ("Germany (incl. DD from 1991)") is ignored
    /// only when the full label matches no alias. A label that matches
    /// neither way passes through whole, parenthetical included.
    pub fn resolve(&self, label: &str) -> Resolution {
        let cleaned = clean(label);
        let key = cleaned.to_lowercase();
        let found = self.by_alias.get(&key).or_else(|| {
            let stem = strip_parenthetical(&key);
            self.by_alias.get(stem).or_else(|| self.by_stem.get(stem))
        });
        match found {
            Some(&idx) => {
                let country = &self.countries[idx];
                Resolution {
                    id: country.name.clone(),
                    kind: country.kind,
                    warning: None,
                }
            }
            None => {
                Resolution {
                    id: CountryId::new(cleaned.clone()),
                    kind: CountryKind::Country,
                    warning: Some(MappingWarning { label: cleaned }),
                }
            }
        }
    }

    pub fn get(&self, id: &CountryId) -> Option<&CanonicalCountry> {
        self.by_name.get(id).map(|&idx| &self.countries[idx])
    }

    /// Kind of a canonical identity. Unmapped identities count as countries.
    pub fn kind(&self, id: &CountryId) -> CountryKind {
        self.get(id).map(|c| c.kind).unwrap_or(CountryKind::Country)
    }

    pub fn is_meta(&self, id: &CountryId) -> bool {
        self.kind(id).is_meta()
    }

    pub fn is_eu_member(&self, id: &CountryId) -> bool {
        self.get(id).map(|c| c.eu_member).unwrap_or(false)
    }

    pub fn eu_members(&self) -> impl Iterator<Item = &CountryId> {
        self.countries.iter().filter(|c| c.eu_member).map(|c| &c.name)
    }

    pub fn len(&self) -> usize {
        self.countries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.countries.is_empty()
    }

    fn insert(&mut self, country: CanonicalCountry) -> Result<(), AliasConflict> {
        let idx = match self.by_name.get(&country.name) {
            Some(&idx) => idx,
            None => {
                self.countries.push(CanonicalCountry {
                    aliases: Vec::new(),
                    ..country.clone()
                });
                let idx = self.countries.len() - 1;
                self.by_name.insert(country.name.clone(), idx);
                idx
            }
        };

        self.add_alias(country.name.as_str(), idx)?;
        for alias in &country.aliases {
            self.add_alias(alias, idx)?;
        }
        self.countries[idx].aliases.extend(country.aliases);
        Ok(())
    }

    fn add_alias(&mut self, alias: &str, idx: usize) -> Result<(), AliasConflict> {
        let key = normalize(alias);
        match self.by_alias.get(&key) {
            Some(&existing) if existing != idx => Err(AliasConflict {
                alias: alias.to_string(),
                first: self.countries[existing].name.clone(),
                second: self.countries[idx].name.clone(),
            }),
            Some(_) => Ok(()),
            None => {
                let stem = strip_parenthetical(&key);
                if stem != key {
                    self.by_stem.entry(stem.to_string()).or_insert(idx);
                }
                self.by_alias.insert(key, idx);
                Ok(())
            }
        }
    }
}

impl Default for CountryTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Trim, drop a BOM, collapse inner whitespace
fn clean(label: &str) -> String {
    label
        .trim()
        .trim_start_matches('\u{feff}')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// "Germany (incl. DD from 1991)" -> "Germany"
fn strip_parenthetical(label: &str) -> &str {
    if label.ends_with(')') {
        if let Some(open) = label.rfind('(') {
            if open > 0 {
                return label[..open].trim_end();
            }
        }
    }
    label
}

fn normalize(label: &str) -> String {
    clean(label).to_lowercase()
}

pub fn default_countries() -> Vec<CanonicalCountry> {
    DEFAULT_COUNTRIES
        .iter()
        .map(|(name, kind, eu_member, aliases)| CanonicalCountry {
            name: CountryId::new(*name),
            kind: *kind,
            eu_member: *eu_member,
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        })
        .collect()
}

use CountryKind::{Aggregate, Country, Region};

type CountryRow = (&'static str, CountryKind, bool, &'static [&'static str]);

const DEFAULT_COUNTRIES: &[CountryRow] = &[
    // Reporting and partner countries of interest
    ("Kyrgyzstan", Country, false, &["Kirghizistan", "Kyrgyz Republic", "Кыргызстан", "Киргизия", "Кыргызская Республика"]),
    ("Kazakhstan", Country, false, &["Казахстан", "Республика Казахстан"]),
    ("Armenia", Country, false, &["Arménie", "Armenie", "Армения"]),
    ("Uzbekistan", Country, false, &["Ouzbékistan", "Ouzbekistan", "Узбекистан"]),
    ("Tajikistan", Country, false, &["Tadjikistan", "Таджикистан"]),
    ("Turkmenistan", Country, false, &["Туркменистан"]),
    ("Azerbaijan", Country, false, &["Azerbaïdjan", "Азербайджан"]),
    ("Georgia", Country, false, &["Géorgie", "Грузия"]),
    ("Russia", Country, false, &["Russian Federation", "Russie", "Россия", "Российская Федерация"]),
    ("Belarus", Country, false, &["Biélorussie", "Беларусь"]),
    ("Ukraine", Country, false, &["Украина"]),
    ("Moldova", Country, false, &["Moldova, Republic of", "Молдова, Республика", "Молдова"]),
    // EU-27
    ("Austria", Country, true, &["Autriche", "Австрия"]),
    ("Belgium", Country, true, &["Belgique", "Бельгия"]),
    ("Bulgaria", Country, true, &["Bulgarie", "Болгария"]),
    ("Croatia", Country, true, &["Croatie", "Хорватия"]),
    ("Cyprus", Country, true, &["Chypre", "Кипр"]),
    ("Czechia", Country, true, &["Czech Republic", "Tchéquie", "Чешская Республика", "Чехия"]),
    ("Denmark", Country, true, &["Danemark", "Дания"]),
    ("Estonia", Country, true, &["Estonie", "Эстония"]),
    ("Finland", Country, true, &["Finlande", "Финляндия"]),
    ("France", Country, true, &["Франция"]),
    ("Germany", Country, true, &["Allemagne", "Германия"]),
    ("Greece", Country, true, &["Grèce", "Греция"]),
    ("Hungary", Country, true, &["Hongrie", "Венгрия"]),
    ("Ireland", Country, true, &["Irlande", "Ирландия"]),
    ("Italy", Country, true, &["Italie", "Италия"]),
    ("Latvia", Country, true, &["Lettonie", "Латвия", "Республика Латвия"]),
    ("Lithuania", Country, true, &["Lituanie", "Литва"]),
    ("Luxembourg", Country, true, &["Люксембург"]),
    ("Malta", Country, true, &["Malte", "Мальта"]),
    ("Netherlands", Country, true, &["Pays-Bas", "Netherlands (the)", "Нидерланды"]),
    ("Poland", Country, true, &["Pologne", "Польша"]),
    ("Portugal", Country, true, &["Португалия"]),
    ("Romania", Country, true, &["Roumanie", "Румыния"]),
    ("Slovakia", Country, true, &["Slovak Republic", "Slovaquie", "Словакия"]),
    ("Slovenia", Country, true, &["Slovénie", "Словения"]),
    ("Spain", Country, true, &["Espagne", "Испания"]),
    ("Sweden", Country, true, &["Suède", "Швеция"]),
    // Other frequent partners
    ("United Kingdom", Country, false, &["UK", "Great Britain", "United Kingdom of Great Britain", "Royaume-Uni", "Соединенное Королевство"]),
    ("Switzerland", Country, false, &["Suisse", "Швейцария"]),
    ("Norway", Country, false, &["Norvège", "Норвегия"]),
    ("Iceland", Country, false, &["Islande", "Исландия"]),
    ("Serbia", Country, false, &["Serbie", "Сербия"]),
    ("Montenegro", Country, false, &["Черногория"]),
    ("North Macedonia", Country, false, &["Macédoine du Nord", "Македония"]),
    ("Albania", Country, false, &["Albanie", "Албания"]),
    ("Bosnia and Herzegovina", Country, false, &["Босния и Герцеговина"]),
    ("Liechtenstein", Country, false, &["Лихтенштейн"]),
    ("Turkey", Country, false, &["Turkiye", "Türkiye", "Turquie", "Турция"]),
    ("China", Country, false, &["Chine", "Китай"]),
    ("Japan", Country, false, &["Japon", "Япония"]),
    ("South Korea", Country, false, &["Korea", "Korea, Republic", "Korea, Republic of", "Республика Корея"]),
    ("India", Country, false, &["Inde", "Индия"]),
    ("Vietnam", Country, false, &["Viet Nam", "Вьетнам"]),
    ("Indonesia", Country, false, &["Индонезия"]),
    ("Malaysia", Country, false, &["Малайзия"]),
    ("Singapore", Country, false, &["Сингапур"]),
    ("Thailand", Country, false, &["Таиланд"]),
    ("United Arab Emirates", Country, false, &["UAE", "Объединенные Арабские Эмираты"]),
    ("Saudi Arabia", Country, false, &["Саудовская Аравия"]),
    ("Israel", Country, false, &["Израиль"]),
    ("Iran", Country, false, &["Iran, Islamic Republic of", "Иран, Исламская Республика"]),
    ("Pakistan", Country, false, &["Пакистан"]),
    ("Bangladesh", Country, false, &["Бангладеш"]),
    ("Mongolia", Country, false, &["Монголия"]),
    ("Taiwan", Country, false, &["Тайвань"]),
    ("Hong Kong", Country, false, &["Гонконг"]),
    ("United States", Country, false, &["USA", "United States of America", "États-Unis", "Соединенные Штаты Америки", "США"]),
    ("Canada", Country, false, &["Канада"]),
    ("Mexico", Country, false, &["Mexique", "Мексика"]),
    ("Brazil", Country, false, &["Brésil", "Бразилия"]),
    ("Argentina", Country, false, &["Аргентина"]),
    ("Chile", Country, false, &["Чили"]),
    ("Colombia", Country, false, &["Колумбия"]),
    ("Peru", Country, false, &["Перу"]),
    ("Australia", Country, false, &["Австралия"]),
    ("New Zealand", Country, false, &["Новая Зеландия"]),
    ("Egypt", Country, false, &["Египет"]),
    ("South Africa", Country, false, &["Южная Африка"]),
    ("Morocco", Country, false, &["Марокко"]),
    ("Algeria", Country, false, &["Алжир"]),
    ("Nigeria", Country, false, &["Нигерия"]),
    // Groupings
    ("European Union", Aggregate, false, &[
        "European Union - 27 countries (from 2020)",
        "European Union - 27 countries",
        "EU27_2020",
        "EU",
        "The EU",
        "EU countries",
        "Union européenne",
        "Страны ЕС",
    ]),
    ("Euro area", Aggregate, false, &["Euro area - 20 countries (from 2023)", "Euro area - 19 countries", "Zone euro", "EA20"]),
    ("World", Aggregate, false, &["Total", "All countries of the world", "Всего", "Мир"]),
    ("Extra-EU", Aggregate, false, &["Extra-EU27", "Extra-EU27 (from 2020)", "Non-EU countries", "Страны вне ЕС"]),
    ("Commonwealth of Independent States", Aggregate, false, &["CIS", "CIS countries", "Страны СНГ", "СНГ"]),
    ("Eurasian Economic Union", Aggregate, false, &["EAEU", "EAEU countries", "Страны ЕАЭС", "ЕАЭС"]),
    ("Non-EAEU countries", Aggregate, false, &["Страны вне ЕАЭС"]),
    ("Shanghai Cooperation Organisation", Aggregate, false, &["SCO", "ШОС"]),
    ("Rest of the world", Aggregate, false, &["Other countries", "Остальные страны мира"]),
    ("Asia", Region, false, &["Asie", "Азия"]),
    ("Americas", Region, false, &["America", "Amérique", "Америка"]),
    ("Africa", Region, false, &["Afrique", "Африка"]),
    ("Europe", Region, false, &["Европа"]),
    ("Australia and Oceania", Region, false, &["Oceania", "Océanie", "Австралия и Океания"]),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rows_have_no_conflicts() {
        assert!(CountryTable::new(default_countries()).is_ok());
    }

    #[test]
    fn test_cross_language_aliases_share_identity() {
        let table = CountryTable::with_defaults();
        let ids: Vec<CountryId> = ["Kirghizistan", "Kyrgyzstan", "Кыргызстан", "  KYRGYZSTAN "]
            .iter()
            .map(|l| table.resolve(l).id)
            .collect();
        assert!(ids.iter().all(|id| id.as_str() == "Kyrgyzstan"));
    }

    #[test]
    fn test_parenthetical_and_bom_ignored() {
        let table = CountryTable::with_defaults();
        assert_eq!(table.resolve("Germany (incl. DD from 1991)").id.as_str(), "Germany");
        assert_eq!(table.resolve("\u{feff}France").id.as_str(), "France");
        assert_eq!(
            table.resolve("European Union - 27 countries (from 2020)").id.as_str(),
            "European Union"
        );
    }

    #[test]
    fn test_unmapped_label_passes_through_with_warning() {
        let table = CountryTable::with_defaults();
        let res = table.resolve("  Atlantis ");
        assert_eq!(res.id.as_str(), "Atlantis");
        assert_eq!(res.kind, CountryKind::Country);
        assert_eq!(res.warning.unwrap().label, "Atlantis");
    }

    #[test]
    fn test_unmapped_parentheticals_stay_distinct() {
        let table = CountryTable::with_defaults();
        let british = table.resolve("Virgin Islands (British)");
        let us = table.resolve(" Virgin  Islands (US)");
        assert_eq!(british.id.as_str(), "Virgin Islands (British)");
        assert_eq!(us.id.as_str(), "Virgin Islands (US)");
        assert_eq!(us.warning.unwrap().label, "Virgin Islands (US)");

        // a known stem still wins over the pass-through
        assert!(table.resolve("Netherlands (the)").warning.is_none());
        assert_eq!(table.resolve("Euro area - 20 countries (from 2025)").id.as_str(), "Euro area");
    }

    #[test]
    fn test_parenthetical_aliases_do_not_conflict() {
        let mut extra = BTreeMap::new();
        extra.insert("Virgin Islands (British)".to_string(), "British Virgin Islands".to_string());
        extra.insert("Virgin Islands (US)".to_string(), "US Virgin Islands".to_string());
        let mut table = CountryTable::with_defaults();
        table.extend(&extra).unwrap();

        assert_eq!(table.resolve("Virgin Islands (US)").id.as_str(), "US Virgin Islands");
        assert_eq!(
            table.resolve("virgin islands (british)").id.as_str(),
            "British Virgin Islands"
        );
    }

    #[test]
    fn test_meta_partners() {
        let table = CountryTable::with_defaults();
        assert!(table.resolve("Union européenne").kind.is_meta());
        assert!(table.resolve("Азия").kind.is_meta());
        assert!(table.is_meta(&CountryId::from("World")));
        assert!(!table.is_meta(&CountryId::from("Germany")));
        assert!(!table.is_meta(&CountryId::from("Unknown Land")));
    }

    #[test]
    fn test_eu_membership_has_27_members() {
        let table = CountryTable::with_defaults();
        assert_eq!(table.eu_members().count(), 27);
        assert!(table.is_eu_member(&CountryId::from("Germany")));
        assert!(!table.is_eu_member(&CountryId::from("United Kingdom")));
    }

    #[test]
    fn test_extend_adds_aliases_and_new_countries() {
        let mut table = CountryTable::with_defaults();
        let mut extra = BTreeMap::new();
        extra.insert("Deutschland".to_string(), "Germany".to_string());
        extra.insert("Atlantida".to_string(), "Atlantis".to_string());
        table.extend(&extra).unwrap();

        assert_eq!(table.resolve("deutschland").id.as_str(), "Germany");
        let res = table.resolve("Atlantida");
        assert_eq!(res.id.as_str(), "Atlantis");
        assert!(res.warning.is_none());
    }

    #[test]
    fn test_conflicting_alias_rejected() {
        let mut table = CountryTable::with_defaults();
        let mut extra = BTreeMap::new();
        extra.insert("Kirghizistan".to_string(), "Kazakhstan".to_string());
        let err = table.extend(&extra).unwrap_err();
        assert_eq!(err.first.as_str(), "Kyrgyzstan");
    }

    #[test]
    fn test_new_rejects_duplicate_alias() {
        let countries = vec![
            CanonicalCountry {
                name: CountryId::from("A"),
                kind: CountryKind::Country,
                eu_member: false,
                aliases: vec!["x".into()],
            },
            CanonicalCountry {
                name: CountryId::from("B"),
                kind: CountryKind::Country,
                eu_member: false,
                aliases: vec!["X".into()],
            },
        ];
        assert!(CountryTable::new(countries).is_err());
    }
}
