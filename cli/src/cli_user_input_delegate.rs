use std::{
    fmt,
    io::{self, Write},
    path::Path,
};

use addman_utils::user_input_delegate::{PathCompleter, UserInputDelegate};

/// Never list more completions than this.
const MAX_COMPLETIONS_SHOWN: usize = 20;

#[derive(Debug)]
pub(crate) struct CliUserInputDelegate {
    buf: String,
}

impl CliUserInputDelegate {
    pub(crate) fn new() -> Self {
        Self { buf: String::new() }
    }

    fn read_user_input(&mut self) -> io::Result<&str> {
        io::stdout().flush()?;

        self.buf.clear();
        if io::stdin().read_line(&mut self.buf)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stdin was closed while waiting for input",
            ));
        }

        Ok(self.buf.trim())
    }

    fn get_item_index_of_item(&mut self, num_items: usize) -> io::Result<usize> {
        loop {
            print!("> ");
            let input = self.read_user_input()?;

            let n = match input.parse::<usize>() {
                Ok(n) => n,
                Err(_) => {
                    println!("Is not parsable to a non-negative integer.");
                    continue;
                },
            };

            if n >= num_items {
                println!(
                    "{} is not an item selection between 0 - {}",
                    n,
                    num_items - 1
                );
                continue;
            }

            return Ok(n);
        }
    }
}

impl UserInputDelegate for CliUserInputDelegate {
    fn select_item_from_list<T: fmt::Display>(
        &mut self,
        message: &str,
        items: &[T],
    ) -> io::Result<usize> {
        println!("{message}");
        for (i, item) in items.iter().enumerate() {
            println!("{i} - {item}");
        }

        self.get_item_index_of_item(items.len())
    }

    fn get_path_input(
        &mut self,
        message: &str,
        default: Option<&str>,
        complete: PathCompleter<'_>,
    ) -> io::Result<String> {
        loop {
            match default {
                Some(default) => print!("{message} [{default}] "),
                None => print!("{message} "),
            }

            let input = self.read_user_input()?.to_string();

            let answer = match (input.is_empty(), default) {
                (true, Some(default)) => return Ok(default.to_string()),
                (true, None) => continue,
                (false, _) => input,
            };

            if Path::new(&answer).is_dir() {
                return Ok(answer);
            }

            // Not a directory (yet). Show what it could be completed to and ask again.
            let completions = complete(&answer);
            if completions.is_empty() {
                return Ok(answer);
            }

            println!("\"{answer}\" is not a directory. Did you mean:");
            for completion in completions.iter().take(MAX_COMPLETIONS_SHOWN) {
                println!("  {completion}");
            }

            if completions.len() > MAX_COMPLETIONS_SHOWN {
                println!("  ... and {} more", completions.len() - MAX_COMPLETIONS_SHOWN);
            }
        }
    }
}
