use anyhow::Result;

use super::table;
use crate::config::Config;

pub fn handle_formats(config: &Config) -> Result<()> {
    let registry = config.registry();
    let mut formats = table(vec!["Format", "Type", "Read", "Write", "Extensions"]);
    for entry in registry.entries() {
        let io = (entry.create)();
        let yes_no = |flag: bool| if flag { "yes" } else { "no" };
        formats.add_row(vec![
            io.name().to_owned(),
            format!("{:?}", io.file_type()),
            yes_no(io.has_read_operation()).to_owned(),
            yes_no(io.has_write_operation()).to_owned(),
            io.supported_extensions().join(", "),
        ]);
    }
    println!("{formats}");
    Ok(())
}
