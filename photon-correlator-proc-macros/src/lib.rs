extern crate proc_macro;
use proc_macro::TokenStream;
use quote::{quote, format_ident};
use syn::parse::{Parse, ParseStream, Result};
use syn::{parse_macro_input, Ident, Token};

struct TagStreamArgs {
    name: Ident,
    word: Ident,
}

impl Parse for TagStreamArgs {
    fn parse(input: ParseStream) -> Result<Self> {
        let name: Ident = input.parse()?;
        input.parse::<Token![,]>()?;
        let word: Ident = input.parse()?;

        Ok(TagStreamArgs {
            name,
            word,
        })
    }
}

// example use
// #[make_tag_stream(Compact32, u32)]
// fn parse_record(&mut self, record: Self::RecordSize) -> Option<TimeTag> { ... }
//
// Expands to a `Compact32Stream` that reads little endian `u32` records from a
// tag file in blocks and yields the `TimeTag`s returned by `parse_record`.
// Records for which `parse_record` returns `None` (overflows, markers) are skipped.
#[proc_macro_attribute]
pub fn make_tag_stream(args: TokenStream, item: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(item as syn::ItemFn);
    let TagStreamArgs {
        name,
        word,
    } = parse_macro_input!(args as TagStreamArgs);
    let stream_name = format_ident!("{}Stream", name);
    let read_into = format_ident!("read_{}_into", word);

    let output = quote!{
        #[allow(non_camel_case_types)]
        pub struct #stream_name {
            source: BufReader<std::fs::File>,
            click_buffer: Vec<#word>,
            num_records: usize,
            time_resolution: f64,
            records_in_buffer: usize,
            buffer_len: usize,
            record_count: usize,
            overflow_correction: u64,
        }

        impl #stream_name {
            pub fn new(tag_file: &TagFile) -> Result<Self, Error> {
                let header = &tag_file.header;
                let file = std::fs::File::open(&tag_file.path)?;
                let available = (file.metadata()?.len().saturating_sub(HEADER_SIZE)
                    / std::mem::size_of::<#word>() as u64) as usize;
                let mut num_records = header.num_records as usize;
                if available < num_records {
                    warn!(
                        declared = num_records,
                        available,
                        "tag file ended before its declared record count"
                    );
                    num_records = available;
                }

                let mut buffered = BufReader::with_capacity(8*1024, file);
                buffered.seek(SeekFrom::Start(HEADER_SIZE))?;

                Ok(Self {
                    source: buffered,
                    click_buffer: vec![0; BUFFER_SIZE],
                    num_records,
                    time_resolution: header.resolution_ps,
                    records_in_buffer: 0,
                    buffer_len: 0,
                    record_count: 0,
                    overflow_correction: 0,
                })
            }
        }

        impl TagStream for #stream_name {
            type RecordSize = #word;
            #[inline(always)]
            #input

            fn time_resolution(&self) -> f64 {self.time_resolution}
        }

        impl Iterator for #stream_name {
            type Item = TimeTag;

            #[inline(always)]
            fn next(&mut self) -> Option<Self::Item> {
                loop {
                    if self.record_count >= self.num_records {
                        return None;
                    }
                    if self.records_in_buffer == 0 {
                        let to_read = (self.num_records - self.record_count).min(BUFFER_SIZE);
                        let read_res = self.source.#read_into::<LittleEndian>(&mut self.click_buffer[..to_read]);
                        if let Err(e) = read_res {
                            warn!(
                                missed = self.num_records - self.record_count,
                                error = %e,
                                "tag file could not be read to its end"
                            );
                            self.record_count = self.num_records;
                            return None;
                        };
                        self.buffer_len = to_read;
                        self.records_in_buffer = to_read;
                    }

                    let current_record = self.buffer_len - self.records_in_buffer;
                    self.records_in_buffer -= 1;
                    self.record_count += 1;
                    if let Some(tag) = self.parse_record(self.click_buffer[current_record]) {
                        return Some(tag);
                    }
                }
            }
        }
    };
    output.into()
}
