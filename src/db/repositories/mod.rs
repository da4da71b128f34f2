mod dismissals;
mod practice_sessions;
mod preferences;
mod stress_entries;
