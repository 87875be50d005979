//! Collection reconstruction
//!
//! When the decoder meets a BSON array it must rebuild a host collection
//! whose concrete kind is only known from the declared target type. Each
//! target type exposes a static [`CollectionDescriptor`]; the reconstructor
//! picks one of a closed set of [`Strategy`] values from it:
//!
//! - `FixedArray`: buffer all elements, then materialize exactly that many
//! - `OrderedList`: append by index into a new or supplied list
//! - `GenericCollection`: add into a new or supplied collection
//!
//! Stream order is always the materialization order.

use std::collections::{BTreeSet, HashSet, LinkedList, VecDeque};
use std::hash::Hash;

use crate::error::{CodecError, Result, WireError};

/// What a collection type can do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Length fixed at construction; cannot grow
    FixedSize,

    /// Supports insertion at an index
    Indexed,

    /// Supports only "add"
    Appendable,
}

/// Static description of a collection target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionDescriptor {
    pub type_name: &'static str,
    pub capability: Option<Capability>,
}

impl CollectionDescriptor {
    pub const fn new(type_name: &'static str, capability: Option<Capability>) -> Self {
        Self {
            type_name,
            capability,
        }
    }
}

/// Reconstruction strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    FixedArray,
    OrderedList,
    GenericCollection,
}

impl Strategy {
    /// Select the strategy for a descriptor
    ///
    /// # Returns
    /// * `UnsupportedCollectionType` when the descriptor has no capability
    pub fn select(descriptor: &CollectionDescriptor) -> Result<Self> {
        match descriptor.capability {
            Some(Capability::FixedSize) => Ok(Strategy::FixedArray),
            Some(Capability::Indexed) => Ok(Strategy::OrderedList),
            Some(Capability::Appendable) => Ok(Strategy::GenericCollection),
            None => Err(CodecError::UnsupportedCollectionType {
                type_name: descriptor.type_name.to_string(),
            }
            .into()),
        }
    }
}

/// A host collection the decoder can rebuild
///
/// Implementors override only the operations matching their capability;
/// the defaults report `InvalidState`.
pub trait CollectionTarget: Sized {
    type Element;

    fn descriptor() -> CollectionDescriptor;

    /// Build a fixed-size collection holding exactly `buffer`
    fn materialize(buffer: Vec<Self::Element>) -> Result<Self> {
        drop(buffer);
        Err(not_capable::<Self>("materialized from a buffer"))
    }

    /// An empty growable collection
    fn empty() -> Result<Self> {
        Err(not_capable::<Self>("created empty"))
    }

    fn current_len(&self) -> usize;

    fn insert_at(&mut self, index: usize, element: Self::Element) -> Result<()> {
        let _ = (index, element);
        Err(not_capable::<Self>("indexed"))
    }

    fn add(&mut self, element: Self::Element) -> Result<()> {
        let _ = element;
        Err(not_capable::<Self>("appended to"))
    }
}

fn not_capable<C: CollectionTarget>(action: &str) -> WireError {
    CodecError::InvalidState(format!(
        "{} cannot be {action}",
        C::descriptor().type_name
    ))
    .into()
}

/// Rebuild a collection from decoded elements in stream order
///
/// # Arguments
/// * `elements` - Decoded elements, in the order they appeared on the wire
/// * `existing` - Optional instance to extend in place
///
/// # Returns
/// * `Result<C>` - The materialized collection
pub fn reconstruct<C, I>(elements: I, existing: Option<C>) -> Result<C>
where
    C: CollectionTarget,
    I: IntoIterator<Item = C::Element>,
{
    let descriptor = C::descriptor();
    match Strategy::select(&descriptor)? {
        Strategy::FixedArray => {
            if existing.is_some() {
                return Err(CodecError::InvalidState(format!(
                    "fixed-size {} cannot be appended to in place",
                    descriptor.type_name
                ))
                .into());
            }
            let buffer: Vec<C::Element> = elements.into_iter().collect();
            C::materialize(buffer)
        }
        Strategy::OrderedList => {
            let mut list = match existing {
                Some(list) => list,
                None => C::empty()?,
            };
            for element in elements {
                let index = list.current_len();
                list.insert_at(index, element)?;
            }
            Ok(list)
        }
        Strategy::GenericCollection => {
            let mut collection = match existing {
                Some(collection) => collection,
                None => C::empty()?,
            };
            for element in elements {
                collection.add(element)?;
            }
            Ok(collection)
        }
    }
}

impl<T, const N: usize> CollectionTarget for [T; N] {
    type Element = T;

    fn descriptor() -> CollectionDescriptor {
        CollectionDescriptor::new(std::any::type_name::<Self>(), Some(Capability::FixedSize))
    }

    fn materialize(buffer: Vec<T>) -> Result<Self> {
        let found = buffer.len();
        buffer.try_into().map_err(|_| {
            CodecError::InvalidState(format!(
                "{} expects exactly {N} elements, found {found}",
                std::any::type_name::<Self>()
            ))
            .into()
        })
    }

    fn current_len(&self) -> usize {
        N
    }
}

impl<T> CollectionTarget for Box<[T]> {
    type Element = T;

    fn descriptor() -> CollectionDescriptor {
        CollectionDescriptor::new(std::any::type_name::<Self>(), Some(Capability::FixedSize))
    }

    fn materialize(buffer: Vec<T>) -> Result<Self> {
        Ok(buffer.into_boxed_slice())
    }

    fn current_len(&self) -> usize {
        self.len()
    }
}

impl<T> CollectionTarget for Vec<T> {
    type Element = T;

    fn descriptor() -> CollectionDescriptor {
        CollectionDescriptor::new(std::any::type_name::<Self>(), Some(Capability::Indexed))
    }

    fn empty() -> Result<Self> {
        Ok(Vec::new())
    }

    fn current_len(&self) -> usize {
        self.len()
    }

    fn insert_at(&mut self, index: usize, element: T) -> Result<()> {
        self.insert(index, element);
        Ok(())
    }
}

impl<T> CollectionTarget for VecDeque<T> {
    type Element = T;

    fn descriptor() -> CollectionDescriptor {
        CollectionDescriptor::new(std::any::type_name::<Self>(), Some(Capability::Indexed))
    }

    fn empty() -> Result<Self> {
        Ok(VecDeque::new())
    }

    fn current_len(&self) -> usize {
        self.len()
    }

    fn insert_at(&mut self, index: usize, element: T) -> Result<()> {
        self.insert(index, element);
        Ok(())
    }
}

impl<T> CollectionTarget for LinkedList<T> {
    type Element = T;

    fn descriptor() -> CollectionDescriptor {
        CollectionDescriptor::new(std::any::type_name::<Self>(), Some(Capability::Appendable))
    }

    fn empty() -> Result<Self> {
        Ok(LinkedList::new())
    }

    fn current_len(&self) -> usize {
        self.len()
    }

    fn add(&mut self, element: T) -> Result<()> {
        self.push_back(element);
        Ok(())
    }
}

/// Elements are added in stream order; the set then orders and dedupes them
impl<T: Ord> CollectionTarget for BTreeSet<T> {
    type Element = T;

    fn descriptor() -> CollectionDescriptor {
        CollectionDescriptor::new(std::any::type_name::<Self>(), Some(Capability::Appendable))
    }

    fn empty() -> Result<Self> {
        Ok(BTreeSet::new())
    }

    fn current_len(&self) -> usize {
        self.len()
    }

    fn add(&mut self, element: T) -> Result<()> {
        self.insert(element);
        Ok(())
    }
}

impl<T: Hash + Eq> CollectionTarget for HashSet<T> {
    type Element = T;

    fn descriptor() -> CollectionDescriptor {
        CollectionDescriptor::new(std::any::type_name::<Self>(), Some(Capability::Appendable))
    }

    fn empty() -> Result<Self> {
        Ok(HashSet::new())
    }

    fn current_len(&self) -> usize {
        self.len()
    }

    fn add(&mut self, element: T) -> Result<()> {
        self.insert(element);
        Ok(())
    }
}
