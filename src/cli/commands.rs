use crate::error::*;
use crate::table::Table;
use crate::uuid::generate_random_guid;
use gptkit::config::{DEFAULT_BLOCK_SIZE, PRIMARY_LBA};
use gptkit::protective_mbr::write_protective_mbr_into;
use gptkit::{Gpt, GptConfig, GptPartitionEntry, Guid};
use log::{debug, info};

const BYTE_UNITS: &[&str] = &["kB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

pub fn format_bytes(value: u64) -> String {
    BYTE_UNITS
        .iter()
        .enumerate()
        .map(|(i, u)| {
            let unit = 1000_u64.checked_pow(i as u32 + 1);
            (unit.map_or(0, |x| value / x), u)
        })
        .take_while(|(i, _)| *i > 10)
        .map(|(i, u)| format!("{} {}", i, u))
        .last()
        .unwrap_or(format!("{} B ", value))
}

pub fn open(image: &[u8], block_size: Option<u64>) -> Result<Gpt> {
    let gpt = if let Some(ss) = block_size {
        Gpt::read_image(image, ss)?
    } else {
        Gpt::find_image(image)?
    };

    if gpt.is_backup() {
        eprintln!("WARNING: the primary GPT is corrupted, using the backup copy");
    }

    Ok(gpt)
}

pub fn print(path: &str, image: &[u8], block_size: Option<u64>) -> Result<()> {
    let gpt = open(image, block_size)?;
    let len = image.len() as u64;
    let ss = gpt.block_size;
    let usable = gpt
        .header
        .last_lba
        .saturating_add(1)
        .saturating_sub(gpt.header.first_lba);

    println!("Block size: {} bytes", ss);
    println!("Disk size: {} ({} bytes)", format_bytes(len).trim(), len);
    println!(
        "Usable blocks: {}-{} ({} blocks)",
        gpt.header.first_lba, gpt.header.last_lba, usable,
    );
    println!(
        "Usable space: {} ({} bytes)",
        format_bytes(usable.saturating_mul(ss)).trim(),
        usable.saturating_mul(ss),
    );
    println!("Disk identifier: {}", gpt.header.guid);
    println!(
        "Partition table: {} entries of {} bytes at LBA {}",
        gpt.header.entries, gpt.header.entry_size, gpt.header.table_offset,
    );
    println!();

    let mut table = Table::new(8);
    table.add_cell("Device");
    table.add_cell_rtl("Start");
    table.add_cell_rtl("End");
    table.add_cell_rtl("Blocks");
    table.add_cell_rtl("Size");
    table.add_cell("Type");
    table.add_cell("GUID");
    table.add_cell("Name");
    for (i, p) in gpt.partitions.iter().enumerate() {
        let blocks = p.size()?;

        table.add_cell(&format!("{}{}", path, i + 1));
        table.add_cell_rtl(&p.starting_lba.to_string());
        table.add_cell_rtl(&p.ending_lba.to_string());
        table.add_cell_rtl(&blocks.to_string());
        table.add_cell_rtl(&format_bytes(blocks.saturating_mul(ss)));
        table.add_cell(&p.partition_type_guid.to_string());
        table.add_cell(&p.unique_partition_guid.to_string());
        table.add_cell(&p.partition_name.to_string());
    }
    print!("{}", table);

    Ok(())
}

fn check_copy(image: &[u8], block_size: u64, lba: u64) -> Vec<String> {
    let mut problems = Vec::new();
    let offset = match lba.checked_mul(block_size) {
        Some(x) if x < image.len() as u64 => x as usize,
        _ => return vec![format!("LBA {} is outside of the image", lba)],
    };

    let gpt: Gpt = match Gpt::from_bytes(image, offset, block_size) {
        Ok(gpt) => gpt,
        Err(err) => return vec![err.to_string()],
    };

    match gpt.checksum_header_in(image, offset) {
        Ok(sum) if sum == gpt.header.header_checksum => {}
        Ok(sum) => problems.push(format!(
            "header checksum mismatch (stored {:#010x}, computed {:#010x})",
            gpt.header.header_checksum, sum
        )),
        Err(err) => problems.push(err.to_string()),
    }

    let table = gpt
        .header
        .table_offset
        .checked_mul(block_size)
        .filter(|x| *x < image.len() as u64)
        .map(|x| gpt.checksum_table_in(image, x as usize));
    match table {
        Some(Ok(sum)) if sum == gpt.header.table_checksum => {}
        Some(Ok(sum)) => problems.push(format!(
            "partition table checksum mismatch (stored {:#010x}, computed {:#010x})",
            gpt.header.table_checksum, sum
        )),
        Some(Err(err)) => problems.push(err.to_string()),
        None => problems.push(format!(
            "partition table at LBA {} is outside of the image",
            gpt.header.table_offset
        )),
    }

    problems
}

pub fn verify(image: &[u8], block_size: Option<u64>) -> Result<()> {
    let ss = block_size
        .or_else(|| {
            Gpt::<GptPartitionEntry>::find_image(image)
                .ok()
                .map(|x| x.block_size)
        })
        .unwrap_or(DEFAULT_BLOCK_SIZE);
    let last = (image.len() as u64 / ss).saturating_sub(1);
    debug!("verifying with a block size of {} bytes", ss);

    let mut ok = true;
    for (name, lba) in &[("primary", PRIMARY_LBA), ("backup", last)] {
        let problems = check_copy(image, ss, *lba);

        if problems.is_empty() {
            println!("{} GPT (LBA {}): OK", name, lba);
        } else {
            ok = false;
            for problem in problems {
                println!("{} GPT (LBA {}): {}", name, lba, problem);
            }
        }
    }

    if ok {
        Ok(())
    } else {
        Err(Error::new("verification failed"))
    }
}

pub fn mirror(image: &mut [u8], block_size: Option<u64>) -> Result<()> {
    let mut gpt = open(image, block_size)?;
    info!(
        "rewriting the GPT from the copy at LBA {}",
        gpt.header.current_lba
    );
    gpt.write_image(image)?;
    println!("Both copies of the GPT have been written.");

    Ok(())
}

pub fn init(image: &mut [u8], block_size: Option<u64>, guid: Option<Guid>) -> Result<()> {
    let ss = block_size.unwrap_or(DEFAULT_BLOCK_SIZE);

    if Gpt::<GptPartitionEntry>::find_image(image).is_ok() {
        eprintln!("WARNING: a GPT already exists on the image and will be replaced");
    }

    let guid = guid.unwrap_or_else(generate_random_guid);
    let mut gpt: Gpt = GptConfig::new().block_size(ss).disk_guid(guid).build();
    gpt.fit_to_disk(image.len() as u64)?;

    write_protective_mbr_into(image, ss)?;
    gpt.write_image(image)?;
    println!("GPT created. Disk identifier: {}", guid);

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn new_image(ss: u64, blocks: u64) -> Vec<u8> {
        let mut image = vec![0; (ss * blocks) as usize];
        init(&mut image, Some(ss), Some([0x42; 16].into())).unwrap();
        image
    }

    #[test]
    fn byte_units() {
        assert_eq!(format_bytes(512), "512 B ");
        assert_eq!(format_bytes(51200), "51 kB");
        assert_eq!(format_bytes(100 * 1000 * 1000), "100 MB");
        assert_eq!(format_bytes(u64::MAX), "18 EB");
    }

    #[test]
    fn init_then_verify() {
        fn test(ss: u64) {
            let image = new_image(ss, 200);

            assert_eq!(image[450], 0xee);
            assert!(verify(&image, Some(ss)).is_ok());
            assert!(verify(&image, None).is_ok());

            let gpt = open(&image, None).unwrap();
            assert_eq!(gpt.block_size, ss);
            assert_eq!(gpt.header.guid, Guid::from_bytes([0x42; 16]));
            assert!(gpt.partitions.is_empty());
        }

        test(512);
        test(4096);
    }

    #[test]
    fn init_too_small() {
        let mut image = vec![0; 512 * 60];
        assert!(init(&mut image, None, None).is_err());
    }

    #[test]
    fn mirror_repairs_backup() {
        let mut image = new_image(512, 200);
        let last = image.len() - 512;
        image[last + 40] ^= 0xff;
        assert!(verify(&image, Some(512)).is_err());

        mirror(&mut image, Some(512)).unwrap();
        assert!(verify(&image, Some(512)).is_ok());
    }

    #[test]
    fn mirror_repairs_primary() {
        let mut image = new_image(512, 200);
        image[512 + 40] ^= 0xff;
        assert!(verify(&image, Some(512)).is_err());

        mirror(&mut image, Some(512)).unwrap();
        assert!(verify(&image, Some(512)).is_ok());
    }

    #[test]
    fn print_huge_geometry() {
        let mut image = new_image(512, 200);
        let mut gpt = open(&image, None).unwrap();
        gpt.header.last_lba = u64::MAX;
        gpt.partitions.push(GptPartitionEntry {
            partition_type_guid: [1; 16].into(),
            unique_partition_guid: [2; 16].into(),
            starting_lba: 0,
            ending_lba: u64::MAX - 1,
            attribute_bits: 0,
            partition_name: "huge".into(),
        });
        gpt.write_image(&mut image).unwrap();

        assert!(print("disk.img", &image, None).is_ok());
    }

    #[test]
    fn print_image() {
        let image = new_image(512, 200);
        assert!(print("disk.img", &image, None).is_ok());
        assert!(print("disk.img", &vec![0; 512 * 200], None).is_err());
    }
}
