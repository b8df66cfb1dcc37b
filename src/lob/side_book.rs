//! One side of a book: an ordered price map walked best-first.
//!
//! Both sides share a single `BTreeMap<OrderedFloat<f64>, V>`; the side only
//! decides the walk direction. Bids iterate from the highest price down, asks
//! from the lowest price up, so "first entry" is always the best price.
//!
//! Callers are responsible for only inserting valid (finite, positive) prices.

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::iter::Rev;

use ordered_float::OrderedFloat;

use crate::types::Side;

/// Price-keyed map for one side of the book.
#[derive(Debug, Clone)]
pub struct SideBook<V> {
    side: Side,
    levels: BTreeMap<OrderedFloat<f64>, V>,
}

impl<V> SideBook<V> {
    /// Create an empty side.
    pub fn new(side: Side) -> Self {
        Self {
            side,
            levels: BTreeMap::new(),
        }
    }

    #[inline]
    pub fn side(&self) -> Side {
        self.side
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    #[inline]
    pub fn clear(&mut self) {
        self.levels.clear();
    }

    #[inline]
    pub fn get(&self, price: f64) -> Option<&V> {
        self.levels.get(&OrderedFloat(price))
    }

    #[inline]
    pub fn get_mut(&mut self, price: f64) -> Option<&mut V> {
        self.levels.get_mut(&OrderedFloat(price))
    }

    #[inline]
    pub fn contains(&self, price: f64) -> bool {
        self.levels.contains_key(&OrderedFloat(price))
    }

    /// Insert or replace the value at `price`, returning the old value.
    #[inline]
    pub fn insert(&mut self, price: f64, value: V) -> Option<V> {
        self.levels.insert(OrderedFloat(price), value)
    }

    #[inline]
    pub fn remove(&mut self, price: f64) -> Option<V> {
        self.levels.remove(&OrderedFloat(price))
    }

    /// Value at `price`, created with `Default` if absent.
    #[inline]
    pub fn entry_or_default(&mut self, price: f64) -> &mut V
    where
        V: Default,
    {
        self.levels.entry(OrderedFloat(price)).or_default()
    }

    /// Best (price, value): highest bid or lowest ask.
    #[inline]
    pub fn best(&self) -> Option<(f64, &V)> {
        let entry = match self.side {
            Side::Bid => self.levels.iter().next_back(),
            Side::Ask => self.levels.iter().next(),
        };
        entry.map(|(price, value)| (price.0, value))
    }

    /// Walk levels best-first.
    #[inline]
    pub fn iter(&self) -> Levels<'_, V> {
        match self.side {
            Side::Bid => Levels::Descending(self.levels.iter().rev()),
            Side::Ask => Levels::Ascending(self.levels.iter()),
        }
    }

    /// True if `price` lies within `tolerance_bound` on the passive side of
    /// the book, i.e. not worse than the bound.
    ///
    /// Bids: `price >= bound`. Asks: `price <= bound`.
    #[inline]
    pub fn within_bound(&self, price: f64, bound: f64) -> bool {
        match self.side {
            Side::Bid => price >= bound,
            Side::Ask => price <= bound,
        }
    }

    /// Price `bps` basis points away from `reference`, towards the back of
    /// this side (below for bids, above for asks).
    #[inline]
    pub fn bps_bound(&self, reference: f64, bps: f64) -> f64 {
        match self.side {
            Side::Bid => reference * (1.0 - bps / 10_000.0),
            Side::Ask => reference * (1.0 + bps / 10_000.0),
        }
    }
}

/// Best-first iterator over a [`SideBook`].
pub enum Levels<'a, V> {
    Ascending(btree_map::Iter<'a, OrderedFloat<f64>, V>),
    Descending(Rev<btree_map::Iter<'a, OrderedFloat<f64>, V>>),
}

impl<'a, V> Iterator for Levels<'a, V> {
    type Item = (f64, &'a V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let entry = match self {
            Levels::Ascending(iter) => iter.next(),
            Levels::Descending(iter) => iter.next(),
        };
        entry.map(|(price, value)| (price.0, value))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            Levels::Ascending(iter) => iter.size_hint(),
            Levels::Descending(iter) => iter.size_hint(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(side: Side) -> SideBook<f64> {
        let mut book = SideBook::new(side);
        book.insert(100.0, 1.0);
        book.insert(99.5, 2.0);
        book.insert(101.0, 3.0);
        book
    }

    #[test]
    fn test_bids_walk_descending() {
        let bids = filled(Side::Bid);
        let prices: Vec<f64> = bids.iter().map(|(p, _)| p).collect();
        assert_eq!(prices, vec![101.0, 100.0, 99.5]);
        assert_eq!(bids.best(), Some((101.0, &3.0)));
    }

    #[test]
    fn test_asks_walk_ascending() {
        let asks = filled(Side::Ask);
        let prices: Vec<f64> = asks.iter().map(|(p, _)| p).collect();
        assert_eq!(prices, vec![99.5, 100.0, 101.0]);
        assert_eq!(asks.best(), Some((99.5, &2.0)));
    }

    #[test]
    fn test_insert_replace_and_remove() {
        let mut asks = filled(Side::Ask);
        assert_eq!(asks.insert(100.0, 7.0), Some(1.0));
        assert_eq!(asks.get(100.0), Some(&7.0));
        assert_eq!(asks.remove(100.0), Some(7.0));
        assert_eq!(asks.remove(100.0), None);
        assert_eq!(asks.len(), 2);
    }

    #[test]
    fn test_empty_side_has_no_best() {
        let bids: SideBook<f64> = SideBook::new(Side::Bid);
        assert!(bids.best().is_none());
        assert_eq!(bids.iter().count(), 0);
    }

    #[test]
    fn test_bps_bounds() {
        let bids: SideBook<f64> = SideBook::new(Side::Bid);
        let asks: SideBook<f64> = SideBook::new(Side::Ask);
        assert!((bids.bps_bound(100.0, 50.0) - 99.5).abs() < 1e-12);
        assert!((asks.bps_bound(100.0, 50.0) - 100.5).abs() < 1e-12);
        assert!(bids.within_bound(99.6, 99.5));
        assert!(!bids.within_bound(99.4, 99.5));
        assert!(asks.within_bound(100.4, 100.5));
        assert!(!asks.within_bound(100.6, 100.5));
    }
}
