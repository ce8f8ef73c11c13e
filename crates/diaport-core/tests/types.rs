//! Tests for engine-agnostic types

use diaport_core::types::{
    Address, Guid, MachineType, NameMatcher, NameSearchOptions, Rva, SectionOffset, SymTag, Va,
};

#[test]
fn test_va_rva_conversion()
{
    let load = 0x1_4000_0000;
    let rva = Rva::new(0x1234);
    let va = rva.to_va(load);
    assert_eq!(va, Va::new(0x1_4000_1234));
    assert_eq!(va.to_rva(load), Some(rva));

    // Below the image base, or more than 4 GiB past it
    assert_eq!(Va::new(0x1000).to_rva(load), None);
    assert_eq!(Va::new(load + 0x1_0000_0000).to_rva(load), None);
}

#[test]
fn test_rva_ranges()
{
    let start = Rva::new(0x1000);
    assert!(Rva::new(0x1000).is_within(start, 0x10));
    assert!(Rva::new(0x100F).is_within(start, 0x10));
    assert!(!Rva::new(0x1010).is_within(start, 0x10));
    assert!(!Rva::new(0x0FFF).is_within(start, 0x10));
    assert!(start.is_within(start, 0));
    assert_eq!(Rva::new(0x1010).offset_from(start), Some(0x10));
    assert_eq!(Rva::new(0x10).offset_from(start), None);
}

#[test]
fn test_address_display()
{
    assert_eq!(format!("{}", SectionOffset::new(1, 0x20)), "0001:00000020");
    let address: Address = SectionOffset::new(2, 4).into();
    assert!(matches!(address, Address::Section(SectionOffset { section: 2, offset: 4 })));
}

#[test]
fn test_guid_parse_forms()
{
    let plain: Guid = "E6756135-1E65-4D17-8576-610761398C3C".parse().unwrap();
    let braced: Guid = "{e6756135-1e65-4d17-8576-610761398c3c}".parse().unwrap();
    assert_eq!(plain, braced);
    assert_eq!(plain, Guid::from_u128(0xE675_6135_1E65_4D17_8576_6107_6139_8C3C));
    assert_eq!(plain.to_string(), "E6756135-1E65-4D17-8576-610761398C3C");

    assert!("E6756135-1E65-4D17-8576".parse::<Guid>().is_err());
    assert!("G6756135-1E65-4D17-8576-610761398C3C".parse::<Guid>().is_err());
}

#[test]
fn test_guid_byte_layout()
{
    let guid = Guid::from_u128(0x0403_0201_0605_0807_0809_0A0B_0C0D_0E0F);
    let bytes = guid.to_bytes_le();
    assert_eq!(&bytes[..8], &[1, 2, 3, 4, 5, 6, 7, 8]);
    assert_eq!(Guid::from_bytes_le(bytes), guid);
}

#[test]
fn test_machine_properties()
{
    assert_eq!(MachineType::Amd64.pointer_size(), Some(8));
    assert_eq!(MachineType::I386.pointer_size(), Some(4));
    assert_eq!(MachineType::Unknown.pointer_size(), None);
    assert!(MachineType::Arm64.has_link_register());
    assert!(!MachineType::Amd64.has_link_register());
    assert_eq!(MachineType::from_raw(0x8664), Some(MachineType::Amd64));
    assert_ne!(MachineType::Host.resolve_host(), MachineType::Host);
}

#[test]
fn test_tag_filter()
{
    assert!(SymTag::Null.admits(SymTag::Compiland));
    assert!(!SymTag::Function.admits(SymTag::PublicSymbol));
    assert_eq!(SymTag::PublicSymbol.to_string(), "PublicSymbol");
    assert_eq!("inlinesite".parse::<SymTag>().unwrap(), SymTag::InlineSite);
}

#[test]
fn test_name_search_options()
{
    let wildcard = NameMatcher::new(Some("s?u*"), NameSearchOptions::CASE_REGULAR_EXPRESSION);
    assert!(wildcard.matches("square"));
    assert!(!wildcard.matches("clamp"));

    let file = NameMatcher::new(Some("main.c"), NameSearchOptions::FILE_NAME_EXT | NameSearchOptions::CASE_INSENSITIVE);
    assert!(file.matches("C:\\src\\Main.C"));
    assert!(!file.matches("C:\\src\\domain.c"));
}
