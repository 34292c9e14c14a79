//! Apple framework bundle layout for `xcframework.zip` archives.
//!
//! Apple binaries are grouped into one slice per platform and variant
//! (`macos`, `ios`, `ios` simulator). A bundle allows a single library per
//! slice, so a slice with several architectures holds one universal
//! binary. `Info.plist` at the bundle root lists every slice for Xcode and
//! SwiftPM. Binaries for other platforms sit beside the bundle under
//! `<tuple>/`.

use super::checksum::Checksum;
use super::manifest::ManifestEntry;
use super::naming::ArtefactName;
use super::packaging::{ArchiveEntry, EntrySource};
use super::packaging_error::PackagingError;
use crate::builder::NativeLibraryTarget;
use crate::interface::header::{header_file_name, module_map};
use bindkit_common::{Architecture, Platform};
use object::macho;
use std::collections::BTreeMap;
use std::fs;
use std::io;

/// Name of the bundle descriptor.
pub const INFO_PLIST: &str = "Info.plist";

const HEADERS_DIR: &str = "Headers";
const MODULE_MAP: &str = "module.modulemap";

/// Architectures in a universal binary start on 16 KiB boundaries.
const SLICE_ALIGN_SHIFT: u32 = 14;

/// Length of `fat_header` and of each `fat_arch` record.
const FAT_HEADER_LEN: usize = 8;
const FAT_ARCH_LEN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct SliceKey {
    platform: &'static str,
    simulator: bool,
}

impl SliceKey {
    const fn of(platform: Platform) -> Option<Self> {
        match platform {
            Platform::MacOs => Some(Self {
                platform: "macos",
                simulator: false,
            }),
            Platform::Ios => Some(Self {
                platform: "ios",
                simulator: false,
            }),
            Platform::IosSimulator => Some(Self {
                platform: "ios",
                simulator: true,
            }),
            Platform::Linux | Platform::Windows | Platform::Android => None,
        }
    }
}

/// One `AvailableLibraries` record.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SliceRecord {
    key: SliceKey,
    identifier: String,
    library_file: String,
    architectures: Vec<&'static str>,
}

/// Archive entries and manifest entries for one bundle.
#[derive(Debug)]
pub(super) struct BundleLayout {
    /// Files to write, unsorted.
    pub(super) entries: Vec<ArchiveEntry>,
    /// Manifest entries in the order of the binaries given.
    pub(super) manifest: Vec<ManifestEntry>,
}

/// Lay out `binaries` as an xcframework bundle named after `name`.
///
/// With a `header`, every slice gets a `Headers` directory holding it and
/// a module map for the FFI module.
///
/// # Errors
///
/// Returns I/O or integrity errors while reading the binaries, and
/// [`PackagingError::Io`] when a universal binary would exceed 4 GiB.
pub(super) fn layout(
    name: &ArtefactName,
    binaries: &[&NativeLibraryTarget],
    header: Option<&str>,
) -> Result<BundleLayout, PackagingError> {
    let library = name.library();
    let bundle = name.bundle_dir();
    let mut entries = Vec::new();
    let mut located = Vec::with_capacity(binaries.len());
    let mut slices: BTreeMap<SliceKey, Vec<&NativeLibraryTarget>> = BTreeMap::new();

    for binary in binaries {
        let Some(key) = SliceKey::of(binary.tuple.platform()) else {
            let path = format!(
                "{}/{}",
                binary.tuple,
                binary.tuple.library_file_name(&library.crate_name())
            );
            located.push(ManifestEntry {
                target: binary.tuple,
                path: path.clone(),
                sha256: Checksum::of_file(&binary.binary)?,
            });
            entries.push(ArchiveEntry {
                archive_path: path,
                source: EntrySource::File(binary.binary.clone()),
            });
            continue;
        };
        slices.entry(key).or_default().push(*binary);
    }

    let mut records = Vec::with_capacity(slices.len());
    for (key, mut members) in slices {
        members.sort_by_key(|binary| apple_arch(binary.tuple.architecture()));
        let Some(first) = members.first() else {
            continue;
        };
        let library_file = first.tuple.library_file_name(&library.crate_name());
        let architectures: Vec<&'static str> = members
            .iter()
            .map(|binary| apple_arch(binary.tuple.architecture()))
            .collect();
        let mut identifier = format!("{}-{}", key.platform, architectures.join("_"));
        if key.simulator {
            identifier.push_str("-simulator");
        }
        let slice_dir = format!("{bundle}/{identifier}");
        let path = format!("{slice_dir}/{library_file}");

        let (source, sha256) = match members.as_slice() {
            [single] => (
                EntrySource::File(single.binary.clone()),
                Checksum::of_file(&single.binary)?,
            ),
            _ => {
                let bytes = universal_binary(&members)?;
                let sha256 = Checksum::of_bytes(&bytes);
                (EntrySource::Bytes(bytes), sha256)
            }
        };
        for member in &members {
            located.push(ManifestEntry {
                target: member.tuple,
                path: path.clone(),
                sha256: sha256.clone(),
            });
        }
        entries.push(ArchiveEntry {
            archive_path: path,
            source,
        });
        if let Some(header) = header {
            entries.push(ArchiveEntry {
                archive_path: format!("{slice_dir}/{HEADERS_DIR}/{}", header_file_name(library)),
                source: EntrySource::Bytes(header.as_bytes().to_vec()),
            });
            entries.push(ArchiveEntry {
                archive_path: format!("{slice_dir}/{HEADERS_DIR}/{MODULE_MAP}"),
                source: EntrySource::Bytes(module_map(library).into_bytes()),
            });
        }
        records.push(SliceRecord {
            key,
            identifier,
            library_file,
            architectures,
        });
    }

    if !records.is_empty() {
        entries.push(ArchiveEntry {
            archive_path: format!("{bundle}/{INFO_PLIST}"),
            source: EntrySource::Bytes(info_plist(&records, header.is_some()).into_bytes()),
        });
    }

    let manifest = binaries
        .iter()
        .filter_map(|binary| {
            located
                .iter()
                .find(|entry| entry.target == binary.tuple)
                .cloned()
        })
        .collect();
    Ok(BundleLayout { entries, manifest })
}

/// Architecture name as Apple tooling spells it.
const fn apple_arch(architecture: Architecture) -> &'static str {
    match architecture {
        Architecture::X86_64 => "x86_64",
        Architecture::Aarch64 => "arm64",
        Architecture::Armv7 => "armv7",
        Architecture::I686 => "i386",
    }
}

/// Mach-O `(cputype, cpusubtype)` for `architecture`.
const fn cpu_type(architecture: Architecture) -> (u32, u32) {
    match architecture {
        Architecture::X86_64 => (macho::CPU_TYPE_X86_64, macho::CPU_SUBTYPE_X86_64_ALL),
        Architecture::Aarch64 => (macho::CPU_TYPE_ARM64, macho::CPU_SUBTYPE_ARM64_ALL),
        Architecture::Armv7 => (macho::CPU_TYPE_ARM, macho::CPU_SUBTYPE_ARM_V7),
        Architecture::I686 => (macho::CPU_TYPE_X86, macho::CPU_SUBTYPE_I386_ALL),
    }
}

fn universal_binary(members: &[&NativeLibraryTarget]) -> Result<Vec<u8>, PackagingError> {
    let mut thin = Vec::with_capacity(members.len());
    for member in members {
        thin.push((cpu_type(member.tuple.architecture()), fs::read(&member.binary)?));
    }
    Ok(fat_binary(&thin)?)
}

/// Concatenate thin binaries behind a big-endian `fat_header`, as `lipo
/// -create` does.
fn fat_binary(thin: &[((u32, u32), Vec<u8>)]) -> io::Result<Vec<u8>> {
    let align = 1_usize << SLICE_ALIGN_SHIFT;
    let mut out = Vec::new();
    out.extend_from_slice(&macho::FAT_MAGIC.to_be_bytes());
    out.extend_from_slice(&fat_word(thin.len())?.to_be_bytes());

    let mut offset = (FAT_HEADER_LEN + FAT_ARCH_LEN * thin.len()).next_multiple_of(align);
    let mut offsets = Vec::with_capacity(thin.len());
    for ((cputype, cpusubtype), bytes) in thin {
        out.extend_from_slice(&cputype.to_be_bytes());
        out.extend_from_slice(&cpusubtype.to_be_bytes());
        out.extend_from_slice(&fat_word(offset)?.to_be_bytes());
        out.extend_from_slice(&fat_word(bytes.len())?.to_be_bytes());
        out.extend_from_slice(&SLICE_ALIGN_SHIFT.to_be_bytes());
        offsets.push(offset);
        offset = (offset + bytes.len()).next_multiple_of(align);
    }
    for (start, (_, bytes)) in offsets.into_iter().zip(thin) {
        out.resize(start, 0);
        out.extend_from_slice(bytes);
    }
    Ok(out)
}

fn fat_word(value: usize) -> io::Result<u32> {
    u32::try_from(value).map_err(|_| io::Error::other("universal binary exceeds 4 GiB"))
}

/// Property list describing the bundle's slices.
fn info_plist(records: &[SliceRecord], with_headers: bool) -> String {
    let mut out = String::from(concat!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
        "<!DOCTYPE plist PUBLIC \"-//Apple//DTD PLIST 1.0//EN\" ",
        "\"http://www.apple.com/DTDs/PropertyList-1.0.dtd\">\n",
        "<plist version=\"1.0\">\n",
        "<dict>\n",
        "\t<key>AvailableLibraries</key>\n",
        "\t<array>\n",
    ));
    for record in records {
        out.push_str("\t\t<dict>\n");
        plist_string(&mut out, "BinaryPath", &record.library_file);
        if with_headers {
            plist_string(&mut out, "HeadersPath", HEADERS_DIR);
        }
        plist_string(&mut out, "LibraryIdentifier", &record.identifier);
        plist_string(&mut out, "LibraryPath", &record.library_file);
        out.push_str("\t\t\t<key>SupportedArchitectures</key>\n\t\t\t<array>\n");
        for arch in &record.architectures {
            out.push_str(&format!("\t\t\t\t<string>{arch}</string>\n"));
        }
        out.push_str("\t\t\t</array>\n");
        plist_string(&mut out, "SupportedPlatform", record.key.platform);
        if record.key.simulator {
            plist_string(&mut out, "SupportedPlatformVariant", "simulator");
        }
        out.push_str("\t\t</dict>\n");
    }
    out.push_str(concat!(
        "\t</array>\n",
        "\t<key>CFBundlePackageType</key>\n",
        "\t<string>XFWK</string>\n",
        "\t<key>XCFrameworkFormatVersion</key>\n",
        "\t<string>1.0</string>\n",
        "</dict>\n",
        "</plist>\n",
    ));
    out
}

fn plist_string(out: &mut String, key: &str, value: &str) {
    out.push_str(&format!(
        "\t\t\t<key>{key}</key>\n\t\t\t<string>{value}</string>\n"
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use object::read::macho::{FatArch, FatHeader};

    #[test]
    fn fat_binary_places_each_architecture_on_an_aligned_offset() {
        let thin = vec![
            (cpu_type(Architecture::Aarch64), b"arm64 archive".to_vec()),
            (cpu_type(Architecture::X86_64), b"x86_64 archive".to_vec()),
        ];
        let bytes = fat_binary(&thin).expect("fits in 4 GiB");
        assert_eq!(bytes.get(..4), Some(&[0xca, 0xfe, 0xba, 0xbe][..]));

        let arches = FatHeader::parse_arch32(bytes.as_slice()).expect("valid fat header");
        assert_eq!(arches.len(), 2);
        for (arch, ((cputype, cpusubtype), thin_bytes)) in arches.iter().zip(&thin) {
            assert_eq!(arch.cputype(), *cputype);
            assert_eq!(arch.cpusubtype(), *cpusubtype);
            assert_eq!(arch.align(), SLICE_ALIGN_SHIFT);
            assert_eq!(u64::from(arch.offset()) % (1 << SLICE_ALIGN_SHIFT), 0);
            assert_eq!(
                arch.data(bytes.as_slice()).expect("slice in bounds"),
                thin_bytes.as_slice()
            );
        }
    }

    #[test]
    fn plist_lists_simulator_variant_and_headers() {
        let records = vec![
            SliceRecord {
                key: SliceKey {
                    platform: "ios",
                    simulator: true,
                },
                identifier: "ios-arm64_x86_64-simulator".to_owned(),
                library_file: "libaskar_uniffi.a".to_owned(),
                architectures: vec!["arm64", "x86_64"],
            },
            SliceRecord {
                key: SliceKey {
                    platform: "macos",
                    simulator: false,
                },
                identifier: "macos-arm64".to_owned(),
                library_file: "libaskar_uniffi.a".to_owned(),
                architectures: vec!["arm64"],
            },
        ];
        let plist = info_plist(&records, true);
        assert!(plist.contains("<key>LibraryIdentifier</key>\n\t\t\t<string>ios-arm64_x86_64-simulator</string>"));
        assert!(plist.contains("<string>arm64</string>\n\t\t\t\t<string>x86_64</string>"));
        assert_eq!(plist.matches("<key>SupportedPlatformVariant</key>").count(), 1);
        assert_eq!(plist.matches("<key>HeadersPath</key>").count(), 2);
        assert!(plist.contains("<string>XFWK</string>"));
        assert!(!info_plist(&records, false).contains("HeadersPath"));
    }

    #[test]
    fn non_apple_platforms_have_no_slice() {
        assert_eq!(SliceKey::of(Platform::Linux), None);
        assert_eq!(
            SliceKey::of(Platform::IosSimulator),
            Some(SliceKey {
                platform: "ios",
                simulator: true
            })
        );
    }
}
