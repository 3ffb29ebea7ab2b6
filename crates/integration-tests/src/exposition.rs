use std::collections::BTreeSet;

/// A scraped Prometheus text exposition.
pub struct Exposition {
    text: String,
}

impl Exposition {
    pub fn new(text: String) -> Self {
        Self { text }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// The sample value of `name` with exactly the given labels, if present.
    /// Label order does not matter.
    pub fn value(&self, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
        let wanted: BTreeSet<String> = labels.iter().map(|(k, v)| format!("{k}=\"{v}\"")).collect();

        self.text
            .lines()
            .filter(|line| !line.starts_with('#'))
            .find_map(|line| {
                let (series, value) = line.rsplit_once(' ')?;

                let (metric, found) = match series.split_once('{') {
                    Some((metric, rest)) => {
                        let inner = rest.strip_suffix('}')?;
                        let found: BTreeSet<String> = inner
                            .split(',')
                            .filter(|pair| !pair.is_empty())
                            .map(str::to_string)
                            .collect();

                        (metric, found)
                    }
                    None => (series, BTreeSet::new()),
                };

                (metric == name && found == wanted).then(|| value.parse().ok())?
            })
    }

    /// Like [`Exposition::value`], treating a missing series as zero.
    pub fn value_or_zero(&self, name: &str, labels: &[(&str, &str)]) -> f64 {
        self.value(name, labels).unwrap_or_default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.text.lines().any(|line| line.starts_with(name))
    }
}
