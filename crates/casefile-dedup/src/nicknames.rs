//! Curated first-name equivalence table. Each row is one equivalence
//! class; the first entry is the class representative.

const NICKNAMES: &[&[&str]] = &[
    &["alexander", "alex", "sandy"],
    &["alan", "al"],
    &["andrew", "andy", "drew"],
    &["anthony", "tony"],
    &["benjamin", "ben", "benny"],
    &["charles", "charlie", "chuck"],
    &["christopher", "chris"],
    &["daniel", "dan", "danny"],
    &["david", "dave", "davey"],
    &["deborah", "debbie", "deb"],
    &["donald", "don", "donnie"],
    &["edward", "ed", "eddie", "ted", "teddy"],
    &["elizabeth", "liz", "beth", "betsy", "lizzie", "eliza"],
    &["frederick", "fred", "freddie"],
    &["gregory", "greg"],
    &["henry", "hank", "harry"],
    &["james", "jim", "jimmy", "jamie"],
    &["jeffrey", "jeff", "jeffery", "geoffrey", "geoff"],
    &["jennifer", "jen", "jenny"],
    &["jessica", "jess", "jessie"],
    &["john", "jack", "johnny"],
    &["jonathan", "jon"],
    &["joseph", "joe", "joey"],
    &["katherine", "kate", "katie", "kathy", "catherine", "kathryn"],
    &["kenneth", "ken", "kenny"],
    &["lawrence", "larry"],
    &["leonard", "len", "lenny"],
    &["margaret", "maggie", "peggy", "meg"],
    &["matthew", "matt"],
    &["michael", "mike", "mick", "mikey"],
    &["nathaniel", "nate", "nathan"],
    &["nicholas", "nick", "nicky"],
    &["patricia", "pat", "patty", "trish"],
    &["peter", "pete"],
    &["philip", "phil", "phillip"],
    &["rebecca", "becky"],
    &["richard", "rick", "ricky", "dick", "rich"],
    &["robert", "bob", "bobby", "rob", "robbie"],
    &["ronald", "ron", "ronnie"],
    &["samuel", "sam", "sammy"],
    &["sarah", "sara"],
    &["steven", "stephen", "steve"],
    &["susan", "sue", "suzy"],
    &["thomas", "tom", "tommy"],
    &["timothy", "tim", "timmy"],
    &["victoria", "vicky", "tori"],
    &["virginia", "ginny", "ginger"],
    &["walter", "walt"],
    &["william", "bill", "billy", "will", "willie", "liam"],
];

/// Representative of `first_name`'s class, or `None` if it is not in the
/// table. Expects a lower-cased name.
pub fn canonical_first_name(first_name: &str) -> Option<&'static str> {
    NICKNAMES
        .iter()
        .find(|class| class.contains(&first_name))
        .map(|class| class[0])
}

/// Whether two lower-cased first names are the same or in one class.
pub fn equivalent_first_names(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    match (canonical_first_name(a), canonical_first_name(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equivalence() {
        assert!(equivalent_first_names("bill", "william"));
        assert!(equivalent_first_names("jeff", "jeffrey"));
        assert!(!equivalent_first_names("bill", "bob"));
        assert!(!equivalent_first_names("ghislaine", "gigi"));
        assert!(equivalent_first_names("ghislaine", "ghislaine"));
    }

    #[test]
    fn test_no_name_in_two_classes() {
        let mut seen = std::collections::HashSet::new();
        for class in NICKNAMES {
            for name in *class {
                assert!(seen.insert(*name), "{name} appears twice");
            }
        }
    }
}
