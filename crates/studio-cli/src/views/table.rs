use chrono::NaiveDateTime;
use chrono_humanize::HumanTime;
use comfy_table::{Attribute, Cell, Color, Row, Table};
use studio_core::recurrence::{Instance, Schedulable};

use crate::item::CliItem;

/// Prints `instances` as a table. `now` is the studio's current wall-clock
/// time, used for the relative column.
pub fn display_instances<T: CliItem>(instances: &[Instance<T>], now: NaiveDateTime) {
    if instances.is_empty() {
        println!("No {}s found.", T::NOUN);
        return;
    }
    println!("{}", instance_table(instances, now));
}

pub fn instance_table<T: CliItem>(instances: &[Instance<T>], now: NaiveDateTime) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["ID", "Title", "When", "", "Who / Where", "State"]);

    for instance in instances {
        let item = &instance.item;
        let mut row = Row::new();
        row.add_cell(Cell::new(&instance.id));

        let mut title = String::new();
        if instance.is_series_occurrence() {
            title.push('↻');
            title.push(' ');
        }
        title.push_str(item.title());
        row.add_cell(Cell::new(title));

        let start = item.anchor();
        let end = item.end();
        let when = if end > start {
            format!("{} - {}", start.format("%a %Y-%m-%d %H:%M"), end.format("%H:%M"))
        } else {
            start.format("%a %Y-%m-%d %H:%M").to_string()
        };
        row.add_cell(Cell::new(when));

        let relative = Cell::new(HumanTime::from(start - now));
        row.add_cell(if end <= now {
            relative.fg(Color::DarkGrey)
        } else if start <= now {
            relative.fg(Color::Green).add_attribute(Attribute::Bold)
        } else if start.date() == now.date() {
            relative.fg(Color::Yellow)
        } else {
            relative
        });

        row.add_cell(Cell::new(item.owner().unwrap_or("-")));
        row.add_cell(Cell::new(item.state()));
        table.add_row(row);
    }
    table
}
