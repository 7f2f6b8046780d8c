
mod ical;
