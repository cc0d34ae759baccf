// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use super::Criterion;
use arbor_core::{ArborError, Result};

/// The shape of a wakeup condition.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Shape {
    Criterion(Criterion),
    And(Vec<Criterion>),
    Or(Vec<Criterion>),
    AndOfOrs(Vec<Vec<Criterion>>),
    OrOfAnds(Vec<Vec<Criterion>>),
}

/// A composable wakeup condition a behavior arms itself with.
///
/// Combinators need at least one child, and every inner group of
/// [`and_of_ors`](Self::and_of_ors) and [`or_of_ands`](Self::or_of_ands)
/// needs at least one criterion.
///
/// ```
/// use arbor_data::wakeup::{Criterion, Wakeup};
/// use std::time::Duration;
///
/// let wakeup = Wakeup::or([
///     Criterion::ElapsedTime(Duration::from_millis(250)),
///     Criterion::BehaviorPost { source: None, post_id: Some(3) },
/// ])
/// .unwrap();
/// assert_eq!(wakeup.criteria().count(), 2);
/// assert!(Wakeup::and(Vec::new()).is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Wakeup(pub(crate) Shape);

impl Wakeup {
    /// A condition made of one criterion.
    pub fn on(criterion: Criterion) -> Self {
        Wakeup(Shape::Criterion(criterion))
    }

    /// Met once every criterion has fired.
    pub fn and(criteria: impl IntoIterator<Item = Criterion>) -> Result<Self> {
        non_empty(criteria.into_iter().collect(), "and").map(|c| Wakeup(Shape::And(c)))
    }

    /// Met as soon as any criterion fires.
    pub fn or(criteria: impl IntoIterator<Item = Criterion>) -> Result<Self> {
        non_empty(criteria.into_iter().collect(), "or").map(|c| Wakeup(Shape::Or(c)))
    }

    /// Met once every group has had at least one criterion fire.
    pub fn and_of_ors<G>(groups: impl IntoIterator<Item = G>) -> Result<Self>
    where
        G: IntoIterator<Item = Criterion>,
    {
        groups_of(groups, "and_of_ors", "or").map(|g| Wakeup(Shape::AndOfOrs(g)))
    }

    /// Met as soon as any group has had all of its criteria fire.
    pub fn or_of_ands<G>(groups: impl IntoIterator<Item = G>) -> Result<Self>
    where
        G: IntoIterator<Item = Criterion>,
    {
        groups_of(groups, "or_of_ands", "and").map(|g| Wakeup(Shape::OrOfAnds(g)))
    }

    /// Iterates every criterion of the condition, depth first.
    pub fn criteria(&self) -> Box<dyn Iterator<Item = &Criterion> + '_> {
        match &self.0 {
            Shape::Criterion(c) => Box::new(std::iter::once(c)),
            Shape::And(c) | Shape::Or(c) => Box::new(c.iter()),
            Shape::AndOfOrs(g) | Shape::OrOfAnds(g) => Box::new(g.iter().flatten()),
        }
    }
}

impl From<Criterion> for Wakeup {
    fn from(criterion: Criterion) -> Self {
        Wakeup::on(criterion)
    }
}

fn non_empty(criteria: Vec<Criterion>, combinator: &'static str) -> Result<Vec<Criterion>> {
    if criteria.is_empty() {
        Err(ArborError::EmptyCombinator(combinator))
    } else {
        Ok(criteria)
    }
}

fn groups_of<G>(
    groups: impl IntoIterator<Item = G>,
    combinator: &'static str,
    inner: &'static str,
) -> Result<Vec<Vec<Criterion>>>
where
    G: IntoIterator<Item = Criterion>,
{
    let groups = groups
        .into_iter()
        .map(|g| non_empty(g.into_iter().collect(), inner))
        .collect::<Result<Vec<_>>>()?;
    if groups.is_empty() {
        return Err(ArborError::EmptyCombinator(combinator));
    }
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_combinators_are_rejected() {
        assert!(matches!(Wakeup::and([]), Err(ArborError::EmptyCombinator("and"))));
        assert!(matches!(Wakeup::or([]), Err(ArborError::EmptyCombinator("or"))));
        assert!(matches!(
            Wakeup::and_of_ors(Vec::<Vec<Criterion>>::new()),
            Err(ArborError::EmptyCombinator("and_of_ors"))
        ));
        assert!(matches!(
            Wakeup::or_of_ands([vec![Criterion::Activation], vec![]]),
            Err(ArborError::EmptyCombinator("and"))
        ));
    }

    #[test]
    fn criteria_are_listed_depth_first() {
        let wakeup = Wakeup::or_of_ands([
            vec![Criterion::Activation, Criterion::ElapsedFrames(2)],
            vec![Criterion::Deactivation],
        ])
        .unwrap();
        let kinds: Vec<_> = wakeup.criteria().cloned().collect();
        assert_eq!(
            kinds,
            vec![
                Criterion::Activation,
                Criterion::ElapsedFrames(2),
                Criterion::Deactivation
            ]
        );
    }
}
