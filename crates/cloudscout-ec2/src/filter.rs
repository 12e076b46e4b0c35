//! EC2 API filter model
//!
//! Represents the attribute-match constraints accepted by the EC2
//! describe calls and converts them into the SDK's native filter list.

use std::collections::BTreeMap;

use aws_sdk_ec2::types::Filter as AwsFilter;

/// A set of attribute-match constraints for EC2 describe calls.
///
/// Values under one key are an OR match, separate keys narrow the result
/// (AND). An empty filter matches everything. Attribute names are not
/// validated locally; unknown keys pass through and are rejected, if at
/// all, by the service.
///
/// ```
/// use cloudscout_ec2::Filter;
///
/// let by_methods = {
///     let mut f = Filter::new();
///     f.add_tag("Name", "cc001.example.net");
///     f.add("instance-state-name", "running");
///     f.add("instance-state-name", "stopped");
///     f
/// };
///
/// let by_terms = Filter::from_terms([
///     "tag:Name=cc001.example.net",
///     "instance-state-name=running",
///     "instance-state-name=stopped",
/// ]);
///
/// assert_eq!(by_methods, by_terms);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    entries: BTreeMap<String, Vec<String>>,
}

impl Filter {
    /// An empty filter (no constraint).
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a filter from `key=value` terms.
    ///
    /// A term without `=` is treated as a `tag-value` search.
    pub fn from_terms<I>(terms: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut filter = Filter::new();
        for term in terms {
            filter.parse_term(term.as_ref());
        }
        filter
    }

    /// Add a constraint. Adding to an existing key appends the value,
    /// creating an OR match.
    ///
    /// For filtering on tags, use [`Filter::add_tag`].
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.entry(name.into()).or_default().push(value.into());
    }

    /// Add several acceptable values under one key.
    pub fn add_many<I>(&mut self, name: impl Into<String>, values: I)
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.entries
            .entry(name.into())
            .or_default()
            .extend(values.into_iter().map(Into::into));
    }

    /// Add a constraint on the given tag. Shortcut for `add("tag:<name>", ..)`.
    pub fn add_tag(&mut self, name: &str, value: impl Into<String>) {
        self.add(format!("tag:{name}"), value);
    }

    /// Parse a `key=value` term into a constraint.
    ///
    /// The term is split at the first `=`. A term without `=` is taken as
    /// a `tag-value` search. For tags, use the `tag:Key=value` form.
    pub fn parse_term(&mut self, term: &str) {
        match term.split_once('=') {
            Some((name, value)) => self.add(name, value),
            None => self.add("tag-value", term),
        }
    }

    /// Chaining form of [`Filter::add`].
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.add(name, value);
        self
    }

    /// Chaining form of [`Filter::add_tag`].
    #[must_use]
    pub fn with_tag(mut self, name: &str, value: impl Into<String>) -> Self {
        self.add_tag(name, value);
        self
    }

    /// The acceptable values under a key, if constrained.
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    /// Drop a constraint, returning its values.
    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        self.entries.remove(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over the constraints in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// The SDK's native filter list.
    pub fn to_aws(&self) -> Vec<AwsFilter> {
        self.entries
            .iter()
            .map(|(name, values)| {
                AwsFilter::builder()
                    .name(name.clone())
                    .set_values(Some(values.clone()))
                    .build()
            })
            .collect()
    }

    /// The filter list as a request parameter.
    ///
    /// `None` when empty, so an unconstrained request carries no
    /// `Filters` parameter at all.
    pub fn as_request_filters(&self) -> Option<Vec<AwsFilter>> {
        if self.is_empty() { None } else { Some(self.to_aws()) }
    }
}
