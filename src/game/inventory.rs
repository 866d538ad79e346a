//! Inventory module
//!
//! Player inventory storage and operations:
//! - Up to 28 entries, each with a unique id
//! - Stackable kinds share one entry with a quantity
//! - Every non-stackable unit takes its own entry
//! - Adds are all-or-nothing

use serde::{Serialize, Serializer};
use uuid::Uuid;

use crate::error::GameError;
use crate::game::item::{EquipSlot, ItemCategory, ItemKind, ItemStats};

/// Maximum number of inventory entries
pub const INVENTORY_SIZE: usize = 28;

/// A concrete item held by a player (inventory, equipment or bank)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryItem {
    pub id: Uuid,
    pub kind: ItemKind,
    pub quantity: u32,
}

impl InventoryItem {
    /// Create a new item with a fresh id
    pub fn new(kind: ItemKind, quantity: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            quantity,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

/// Client view of an item: the definition fields plus identity
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ItemView<'a> {
    id: &'a Uuid,
    def_key: ItemKind,
    name: &'static str,
    #[serde(rename = "type")]
    category: ItemCategory,
    slot: Option<EquipSlot>,
    value: u64,
    stats: ItemStats,
    emoji: &'static str,
    color: &'static str,
    stackable: bool,
    quantity: u32,
}

impl Serialize for InventoryItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let def = self.kind.definition();
        ItemView {
            id: &self.id,
            def_key: self.kind,
            name: def.name,
            category: def.category,
            slot: def.slot,
            value: def.value,
            stats: def.stats,
            emoji: def.emoji,
            color: def.color,
            stackable: def.stackable,
            quantity: self.quantity,
        }
        .serialize(serializer)
    }
}

/// Player inventory storage
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct Inventory {
    items: Vec<InventoryItem>,
    #[serde(skip)]
    capacity: usize,
}

impl Default for Inventory {
    fn default() -> Self {
        Self::new(INVENTORY_SIZE)
    }
}

impl Inventory {
    /// Create an empty inventory
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Vec::new(),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn free_slots(&self) -> usize {
        self.capacity.saturating_sub(self.items.len())
    }

    pub fn is_full(&self) -> bool {
        self.free_slots() == 0
    }

    pub fn items(&self) -> &[InventoryItem] {
        &self.items
    }

    pub fn get(&self, id: &Uuid) -> Option<&InventoryItem> {
        self.items.iter().find(|item| item.id == *id)
    }

    /// First entry of a kind
    pub fn find_kind(&self, kind: ItemKind) -> Option<&InventoryItem> {
        self.items.iter().find(|item| item.kind == kind)
    }

    pub fn contains_kind(&self, kind: ItemKind) -> bool {
        self.find_kind(kind).is_some()
    }

    /// Total units of a kind
    pub fn count(&self, kind: ItemKind) -> u64 {
        self.items
            .iter()
            .filter(|item| item.kind == kind)
            .map(|item| item.quantity as u64)
            .sum()
    }

    /// Entries needed to add `quantity` units of `kind`
    pub fn slots_needed(&self, kind: ItemKind, quantity: u32) -> usize {
        if kind.is_stackable() {
            usize::from(!self.contains_kind(kind))
        } else {
            quantity as usize
        }
    }

    pub fn has_room_for(&self, kind: ItemKind, quantity: u32) -> bool {
        self.slots_needed(kind, quantity) <= self.free_slots()
    }

    /// Add units of a kind, or nothing at all
    pub fn add(&mut self, kind: ItemKind, quantity: u32) -> Result<(), GameError> {
        if quantity == 0 {
            return Ok(());
        }
        if !self.has_room_for(kind, quantity) {
            return Err(GameError::InventoryFull);
        }

        if kind.is_stackable() {
            if let Some(stack) = self.items.iter_mut().find(|item| item.kind == kind) {
                stack.quantity = stack.quantity.saturating_add(quantity);
                return Ok(());
            }
            self.items.push(InventoryItem::new(kind, quantity));
        } else {
            self.items
                .extend((0..quantity).map(|_| InventoryItem::new(kind, 1)));
        }
        Ok(())
    }

    /// Put back a specific item, merging stacks
    pub fn insert(&mut self, item: InventoryItem) -> Result<(), GameError> {
        if item.kind.is_stackable() {
            if let Some(stack) = self.items.iter_mut().find(|i| i.kind == item.kind) {
                stack.quantity = stack.quantity.saturating_add(item.quantity);
                return Ok(());
            }
        }
        if self.is_full() {
            return Err(GameError::InventoryFull);
        }
        self.items.push(item);
        Ok(())
    }

    /// Remove `quantity` units from an entry.
    ///
    /// Non-stackable entries are removed whole. The removed portion is
    /// returned; a partial stack removal gets a fresh id.
    pub fn remove(&mut self, id: &Uuid, quantity: u32) -> Result<InventoryItem, GameError> {
        let index = self
            .items
            .iter()
            .position(|item| item.id == *id)
            .ok_or(GameError::ItemNotFound)?;

        let quantity = quantity.max(1);
        let entry = &mut self.items[index];
        if entry.kind.is_stackable() {
            if quantity > entry.quantity {
                return Err(GameError::InsufficientItems);
            }
            if quantity < entry.quantity {
                entry.quantity -= quantity;
                return Ok(InventoryItem::new(entry.kind, quantity));
            }
        }

        Ok(self.items.remove(index))
    }

    /// Remove a whole entry
    pub fn take(&mut self, id: &Uuid) -> Option<InventoryItem> {
        let index = self.items.iter().position(|item| item.id == *id)?;
        Some(self.items.remove(index))
    }
}
