//! Equipment module
//!
//! Player equipment:
//! - One item per slot (head, chest, legs, feet, weapon, offhand, tool)
//! - Equip (swapping out the previous item) and unequip
//! - Attack and defence bonus totals

use std::collections::BTreeMap;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::game::inventory::InventoryItem;
use crate::game::item::{EquipSlot, ItemKind};

/// Worn items by slot
#[derive(Debug, Clone, Default)]
pub struct Equipment {
    slots: BTreeMap<EquipSlot, InventoryItem>,
}

impl Equipment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, slot: EquipSlot) -> Option<&InventoryItem> {
        self.slots.get(&slot)
    }

    /// Wear an item, returning whatever it replaced.
    ///
    /// Items without a slot are handed straight back.
    pub fn equip(&mut self, item: InventoryItem) -> Result<Option<InventoryItem>, InventoryItem> {
        match item.kind.definition().slot {
            Some(slot) => Ok(self.slots.insert(slot, item)),
            None => Err(item),
        }
    }

    pub fn unequip(&mut self, slot: EquipSlot) -> Option<InventoryItem> {
        self.slots.remove(&slot)
    }

    /// Whether any worn item is of this kind
    pub fn has_kind(&self, kind: ItemKind) -> bool {
        self.slots.values().any(|item| item.kind == kind)
    }

    pub fn attack_bonus(&self) -> u32 {
        self.slots
            .values()
            .map(|item| item.kind.definition().stats.attack)
            .sum()
    }

    pub fn defense_bonus(&self) -> u32 {
        self.slots
            .values()
            .map(|item| item.kind.definition().stats.defense)
            .sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EquipSlot, &InventoryItem)> {
        self.slots.iter().map(|(slot, item)| (*slot, item))
    }
}

/// Serialized as an object with every slot present (`null` when empty)
impl Serialize for Equipment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(EquipSlot::ALL.len()))?;
        for slot in EquipSlot::ALL {
            map.serialize_entry(slot.name(), &self.slots.get(&slot))?;
        }
        map.end()
    }
}
