//! Binary HID report descriptor parser.
//!
//! Tokenizes short items (HID 1.11 §6.2.2.2), runs the global/local item state
//! machine, and emits one [`ReportElementDescriptor`] per field of every
//! Input/Output/Feature main item. Long items are skipped.
//!
//! Bit offsets are tracked separately per `(report type, report id)` and start at
//! 0 for every report body.

use std::collections::HashMap;

use tracing::trace;

use super::{DescriptorParseError, ElementFlags, ReportElementDescriptor, ReportType, UsagePage};

/// Upper bound on fields a single main item may declare. Guards against
/// hostile descriptors asking for billions of elements.
const MAX_REPORT_COUNT: u32 = 4096;

/// Item class, bits 2..3 of the item prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemType {
    Main,
    Global,
    Local,
    Reserved,
}

/// One tokenized descriptor item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Item<'a> {
    pub item_type: ItemType,
    pub tag: u8,
    pub data: &'a [u8],
}

impl Item<'_> {
    /// Little-endian value, zero-extended.
    pub fn unsigned(&self) -> u32 {
        self.data
            .iter()
            .rev()
            .fold(0u32, |acc, &b| (acc << 8) | b as u32)
    }

    /// Little-endian value, sign-extended from the item's data size.
    pub fn signed(&self) -> i32 {
        let v = self.unsigned();
        match self.data.len() {
            1 => v as u8 as i8 as i32,
            2 => v as u16 as i16 as i32,
            _ => v as i32,
        }
    }
}

/// Iterator over the items of a report descriptor.
///
/// Yields an error (and then stops) if an item's data runs past the end of the
/// descriptor.
pub struct ItemTokenizer<'a> {
    bytes: &'a [u8],
    pos: usize,
    failed: bool,
}

impl<'a> ItemTokenizer<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: 0,
            failed: false,
        }
    }

    fn truncated(&mut self, at: usize) -> Option<Result<Item<'a>, DescriptorParseError>> {
        self.failed = true;
        Some(Err(DescriptorParseError::Malformed(format!(
            "item at byte {at} runs past the end of the descriptor"
        ))))
    }
}

impl<'a> Iterator for ItemTokenizer<'a> {
    type Item = Result<Item<'a>, DescriptorParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let start = self.pos;
        let prefix = *self.bytes.get(start)?;
        let mut size = match prefix & 0x03 {
            3 => 4,
            n => n as usize,
        };
        let item_type = match (prefix >> 2) & 0x03 {
            0 => ItemType::Main,
            1 => ItemType::Global,
            2 => ItemType::Local,
            _ => ItemType::Reserved,
        };
        let mut tag = prefix >> 4;
        self.pos += 1;

        // Long item: 0xFE, bDataSize, bLongItemTag, data...
        if prefix == 0xFE {
            let Some(&long_size) = self.bytes.get(self.pos) else {
                return self.truncated(start);
            };
            let Some(&long_tag) = self.bytes.get(self.pos + 1) else {
                return self.truncated(start);
            };
            size = long_size as usize;
            tag = long_tag;
            self.pos += 2;
        }

        let Some(data) = self.bytes.get(self.pos..self.pos + size) else {
            return self.truncated(start);
        };
        self.pos += size;

        Some(Ok(Item {
            item_type: if prefix == 0xFE { ItemType::Reserved } else { item_type },
            tag,
            data,
        }))
    }
}

/// Global item state; saved and restored by Push/Pop.
#[derive(Debug, Clone, Default)]
struct Globals {
    usage_page: u16,
    logical_min: i32,
    logical_max: i32,
    logical_max_unsigned: u32,
    physical_min: i32,
    physical_max: i32,
    physical_max_unsigned: u32,
    unit_exponent: i32,
    unit: u32,
    report_size: u32,
    report_id: u8,
    report_count: u32,
}

/// Usage reference as written in a local item. `page` is set for extended
/// (32-bit) usages only.
#[derive(Debug, Clone, Copy)]
struct LocalUsage {
    page: Option<u16>,
    usage: u16,
}

impl LocalUsage {
    fn from_item(item: &Item<'_>) -> Self {
        let v = item.unsigned();
        if item.data.len() == 4 {
            LocalUsage {
                page: Some((v >> 16) as u16),
                usage: v as u16,
            }
        } else {
            LocalUsage {
                page: None,
                usage: v as u16,
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Locals {
    usages: Vec<LocalUsage>,
    usage_min: Option<LocalUsage>,
    usage_max: Option<LocalUsage>,
}

impl Locals {
    /// Resolve the usage list for a main item with `count` fields.
    ///
    /// Explicit usages come first, then the min/max range. When there are fewer
    /// usages than fields, the last usage repeats.
    fn resolve(&self, count: u32, default_page: u16) -> Vec<(u16, u16)> {
        let mut out: Vec<(u16, u16)> = self
            .usages
            .iter()
            .map(|u| (u.page.unwrap_or(default_page), u.usage))
            .collect();

        if let (Some(min), Some(max)) = (self.usage_min, self.usage_max) {
            let page = min.page.or(max.page).unwrap_or(default_page);
            let span = (max.usage as u32).saturating_sub(min.usage as u32);
            let take = span.min(count.saturating_sub(1));
            for i in 0..=take {
                out.push((page, min.usage + i as u16));
            }
        }
        out
    }
}

fn main_flags_to_report_type(tag: u8) -> Option<ReportType> {
    match tag {
        0x8 => Some(ReportType::Input),
        0x9 => Some(ReportType::Output),
        0xB => Some(ReportType::Feature),
        _ => None,
    }
}

/// Bound pair that may have been written as unsigned but sign-extended.
///
/// Descriptors frequently declare e.g. `LOGICAL_MAXIMUM (255)` with a one-byte
/// item, which reads back as -1. A non-negative minimum with a maximum below it
/// means the maximum was meant unsigned.
fn fix_unsigned_max(min: i32, max: i32, max_unsigned: u32) -> i32 {
    if min >= 0 && max < min {
        i32::try_from(max_unsigned).unwrap_or(i32::MAX)
    } else {
        max
    }
}

/// Parse a binary report descriptor into elements.
///
/// The result may be empty (e.g. a descriptor with only collections); the
/// caller decides whether that is an error.
pub fn parse_report_descriptor(bytes: &[u8]) -> Result<Vec<ReportElementDescriptor>, DescriptorParseError> {
    let mut globals = Globals::default();
    let mut stack: Vec<Globals> = Vec::new();
    let mut locals = Locals::default();

    let mut collections: Vec<i32> = Vec::new();
    let mut next_collection: i32 = 0;

    let mut offsets: HashMap<(ReportType, u8), u32> = HashMap::new();
    let mut elements = Vec::new();

    for item in ItemTokenizer::new(bytes) {
        let item = item?;
        match item.item_type {
            ItemType::Main => match item.tag {
                0xA => {
                    collections.push(next_collection);
                    next_collection += 1;
                    locals = Locals::default();
                }
                0xC => {
                    if collections.pop().is_none() {
                        return Err(DescriptorParseError::Malformed(
                            "END_COLLECTION without matching COLLECTION".into(),
                        ));
                    }
                    locals = Locals::default();
                }
                tag => {
                    let Some(report_type) = main_flags_to_report_type(tag) else {
                        trace!(tag, "skipping unknown main item");
                        locals = Locals::default();
                        continue;
                    };
                    emit_fields(
                        report_type,
                        ElementFlags(item.unsigned()),
                        &globals,
                        &locals,
                        collections.last().copied().unwrap_or(-1),
                        &mut offsets,
                        &mut elements,
                    )?;
                    locals = Locals::default();
                }
            },
            ItemType::Global => match item.tag {
                0x0 => globals.usage_page = item.unsigned() as u16,
                0x1 => globals.logical_min = item.signed(),
                0x2 => {
                    globals.logical_max = item.signed();
                    globals.logical_max_unsigned = item.unsigned();
                }
                0x3 => globals.physical_min = item.signed(),
                0x4 => {
                    globals.physical_max = item.signed();
                    globals.physical_max_unsigned = item.unsigned();
                }
                0x5 => {
                    // Unit exponent is a 4-bit two's complement nibble in practice.
                    let v = item.unsigned();
                    globals.unit_exponent = if v <= 0xF {
                        if v >= 8 {
                            v as i32 - 16
                        } else {
                            v as i32
                        }
                    } else {
                        item.signed()
                    };
                }
                0x6 => globals.unit = item.unsigned(),
                0x7 => globals.report_size = item.unsigned(),
                0x8 => {
                    let id = item.unsigned();
                    if id == 0 || id > u8::MAX as u32 {
                        return Err(DescriptorParseError::Malformed(format!(
                            "REPORT_ID {id} out of range 1..=255"
                        )));
                    }
                    globals.report_id = id as u8;
                }
                0x9 => globals.report_count = item.unsigned(),
                0xA => stack.push(globals.clone()),
                0xB => {
                    globals = stack.pop().ok_or_else(|| {
                        DescriptorParseError::Malformed("POP without matching PUSH".into())
                    })?;
                }
                tag => trace!(tag, "skipping reserved global item"),
            },
            ItemType::Local => match item.tag {
                0x0 => locals.usages.push(LocalUsage::from_item(&item)),
                0x1 => locals.usage_min = Some(LocalUsage::from_item(&item)),
                0x2 => locals.usage_max = Some(LocalUsage::from_item(&item)),
                // designators, strings, delimiters
                _ => {}
            },
            ItemType::Reserved => {}
        }
    }

    if !collections.is_empty() {
        return Err(DescriptorParseError::Malformed(format!(
            "{} collection(s) left open",
            collections.len()
        )));
    }

    Ok(elements)
}

fn emit_fields(
    report_type: ReportType,
    flags: ElementFlags,
    globals: &Globals,
    locals: &Locals,
    collection_index: i32,
    offsets: &mut HashMap<(ReportType, u8), u32>,
    elements: &mut Vec<ReportElementDescriptor>,
) -> Result<(), DescriptorParseError> {
    if globals.report_count > MAX_REPORT_COUNT {
        return Err(DescriptorParseError::Malformed(format!(
            "REPORT_COUNT {} exceeds {MAX_REPORT_COUNT}",
            globals.report_count
        )));
    }
    if globals.report_size == 0 || globals.report_count == 0 {
        return Ok(());
    }

    let usages = locals.resolve(globals.report_count, globals.usage_page);
    let logical_max = fix_unsigned_max(
        globals.logical_min,
        globals.logical_max,
        globals.logical_max_unsigned,
    );
    let physical_max = fix_unsigned_max(
        globals.physical_min,
        globals.physical_max,
        globals.physical_max_unsigned,
    );

    let offset = offsets.entry((report_type, globals.report_id)).or_insert(0);
    for i in 0..globals.report_count as usize {
        let (page, usage) = match usages.len() {
            0 => (globals.usage_page, 0),
            n => usages[i.min(n - 1)],
        };
        elements.push(ReportElementDescriptor {
            usage_page: UsagePage(page),
            usage,
            report_id: globals.report_id,
            report_type,
            report_offset_in_bits: *offset,
            report_size_in_bits: globals.report_size,
            logical_min: globals.logical_min,
            logical_max,
            physical_min: globals.physical_min,
            physical_max,
            unit: globals.unit,
            unit_exponent: globals.unit_exponent,
            collection_index,
            flags,
        });
        *offset = offset.checked_add(globals.report_size).ok_or_else(|| {
            DescriptorParseError::Malformed("report exceeds addressable bit range".into())
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizer_splits_short_items() {
        let bytes = [0x05, 0x01, 0x09, 0x08, 0xa1, 0x01, 0x26, 0xff, 0x00, 0xc0];
        let items: Vec<_> = ItemTokenizer::new(&bytes).collect::<Result<_, _>>().unwrap();
        assert_eq!(items.len(), 5);
        assert_eq!(items[0].item_type, ItemType::Global);
        assert_eq!(items[1].item_type, ItemType::Local);
        assert_eq!(items[2].item_type, ItemType::Main);
        assert_eq!(items[2].tag, 0xA);
        assert_eq!(items[3].unsigned(), 0xFF);
        assert_eq!(items[3].signed(), 0xFF);
        assert_eq!(items[4].tag, 0xC);
        assert!(items[4].data.is_empty());
    }

    #[test]
    fn tokenizer_reports_truncation() {
        let bytes = [0x05, 0x01, 0x27, 0xff];
        let mut it = ItemTokenizer::new(&bytes);
        assert!(it.next().unwrap().is_ok());
        assert!(matches!(it.next(), Some(Err(DescriptorParseError::Malformed(_)))));
        assert!(it.next().is_none());
    }

    #[test]
    fn sign_extension_by_item_size() {
        let one = Item { item_type: ItemType::Global, tag: 1, data: &[0xa2] };
        assert_eq!(one.signed(), -94);
        let two = Item { item_type: ItemType::Global, tag: 1, data: &[0xa2, 0xfe] };
        assert_eq!(two.signed(), -350);
    }

    #[test]
    fn one_byte_max_255_is_read_unsigned() {
        let bytes = [
            0x05, 0x01, // usage page (generic desktop)
            0x09, 0x36, // usage (slider)
            0x15, 0x00, // logical min 0
            0x25, 0xff, // logical max 255 (sign-extends to -1)
            0x75, 0x08, 0x95, 0x01, 0x85, 0x01, 0x81, 0x02,
        ];
        let elements = parse_report_descriptor(&bytes).unwrap();
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].logical_min, 0);
        assert_eq!(elements[0].logical_max, 255);
    }

    #[test]
    fn push_pop_restores_globals() {
        let bytes = [
            0x05, 0x01, 0x85, 0x01, 0x75, 0x08, 0x95, 0x01, //
            0xa4, // push
            0x75, 0x10, // size 16
            0x09, 0x30, 0x81, 0x02, //
            0xb4, // pop
            0x09, 0x31, 0x81, 0x02,
        ];
        let elements = parse_report_descriptor(&bytes).unwrap();
        assert_eq!(elements[0].report_size_in_bits, 16);
        assert_eq!(elements[1].report_size_in_bits, 8);
        assert_eq!(elements[1].report_offset_in_bits, 16);
    }

    #[test]
    fn unbalanced_pop_is_malformed() {
        assert!(parse_report_descriptor(&[0xb4]).is_err());
        assert!(parse_report_descriptor(&[0xc0]).is_err());
    }

    #[test]
    fn unclosed_collection_is_malformed() {
        let bytes = [
            0x05, 0x01, 0x09, 0x08, 0xa1, 0x01, // application collection
            0x85, 0x01, 0x75, 0x08, 0x95, 0x01, 0x09, 0x30, 0x81, 0x02,
        ];
        assert!(matches!(
            parse_report_descriptor(&bytes),
            Err(DescriptorParseError::Malformed(_))
        ));
        let mut closed = bytes.to_vec();
        closed.push(0xc0);
        assert_eq!(parse_report_descriptor(&closed).unwrap().len(), 1);
    }

    #[test]
    fn extended_usage_carries_its_own_page() {
        let bytes = [
            0x05, 0x01, 0x85, 0x02, 0x75, 0x01, 0x95, 0x01, //
            0x0b, 0x01, 0x00, 0x09, 0x00, // usage (button:1), 32-bit
            0x81, 0x02,
        ];
        let elements = parse_report_descriptor(&bytes).unwrap();
        assert_eq!(elements[0].usage_page, UsagePage::BUTTON);
        assert_eq!(elements[0].usage, 1);
    }

    #[test]
    fn report_id_zero_item_is_malformed() {
        assert!(parse_report_descriptor(&[0x85, 0x00]).is_err());
    }
}
