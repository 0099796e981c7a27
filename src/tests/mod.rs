


#[cfg(test)]
mod test_data_file;



#[cfg(test)]
mod test_csv_io;
